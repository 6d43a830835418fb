//! Per-class binary serialization metadata.
//!
//! Built once per class from its docblocks and cached for the life of
//! the process. Construction validates the whole policy up front: the
//! class-level serializable marker, the non-polymorphism rule, reserved
//! tag ids, and one tag plus one parseable type per instance field.
//! A class that fails validation fails the same way on every use;
//! failures are not cached.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use instar_core::{ClassDef, ClassRegistry, DocComment, FieldDef};
use instar_phpdoc::{TypeExpr, UseResolver, parse};

use crate::error::MetadataError;

/// One serializable field: its wire tag, parsed type and float32 flag.
#[derive(Debug)]
pub struct FieldMeta {
    name: String,
    id: u8,
    type_expr: TypeExpr,
    as_float32: bool,
}

impl FieldMeta {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire tag, in `[0, 127]`.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The field's parsed type.
    pub fn type_expr(&self) -> &TypeExpr {
        &self.type_expr
    }

    /// Whether floats in this field are stored at single precision.
    pub fn as_float32(&self) -> bool {
        self.as_float32
    }
}

/// Binary serialization metadata for one class.
#[derive(Debug)]
pub struct InstanceMeta {
    class: Arc<ClassDef>,
    fields: Vec<FieldMeta>,
}

impl InstanceMeta {
    /// The class this metadata describes.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Fully-qualified class name.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Serializable fields in declaration order.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Finds the field carrying a wire tag.
    pub fn field_by_tag(&self, tag: i64) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| i64::from(f.id) == tag)
    }
}

type Cache = RwLock<HashMap<String, Arc<InstanceMeta>>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the cached metadata for `class_name`, building it on first
/// use. Concurrent first calls may build twice; one copy wins.
pub fn instance_metadata(class_name: &str) -> Result<Arc<InstanceMeta>, MetadataError> {
    let key = class_name.strip_prefix('\\').unwrap_or(class_name);
    if let Some(meta) = read_lock(cache()).get(key) {
        return Ok(Arc::clone(meta));
    }
    let built = Arc::new(build(key)?);
    let mut map = write_lock(cache());
    let entry = map.entry(key.to_string()).or_insert(built);
    Ok(Arc::clone(entry))
}

fn build(class_name: &str) -> Result<InstanceMeta, MetadataError> {
    let class = ClassRegistry::global().get_or_err(class_name)?;

    let doc = DocComment::parse(class.doc_text().unwrap_or(""));
    if !doc.has_tag("kphp-serializable") {
        return Err(MetadataError::NotSerializable {
            class: class.name().to_string(),
        });
    }

    // One flat tag space per concrete class: no abstract classes, no
    // interfaces, no fields anywhere up the parent chain.
    let chain_has_fields = class
        .ancestors()?
        .iter()
        .any(|parent| !parent.fields().is_empty());
    if class.is_abstract() || class.is_interface() || chain_has_fields {
        return Err(MetadataError::Polymorphic {
            class: class.name().to_string(),
        });
    }

    let mut used_ids: Vec<i64> = match doc.tag("kphp-reserved-fields") {
        Some(tag) => {
            parse_reserved_ids(&tag.value).ok_or_else(|| MetadataError::BadReservedFields {
                class: class.name().to_string(),
            })?
        }
        None => Vec::new(),
    };

    let resolver = UseResolver::for_class(&class);
    let mut fields = Vec::new();

    for field in class.fields() {
        let field_doc = DocComment::parse(field.doc_text().unwrap_or(""));
        let token = field_doc
            .tag("kphp-serialized-field")
            .and_then(|tag| serialized_field_token(&tag.value));

        if field.is_static() {
            if token.is_some() {
                return Err(MetadataError::StaticFieldTagged {
                    field: field.name().to_string(),
                });
            }
            continue;
        }

        let Some(token) = token else {
            return Err(MetadataError::MissingFieldTag {
                field: field.name().to_string(),
            });
        };
        if token == "none" {
            continue;
        }

        let id: i64 = token.parse().map_err(|_| MetadataError::TagOutOfRange {
            token: token.clone(),
            field: field.name().to_string(),
        })?;
        if !(0..=127).contains(&id) {
            return Err(MetadataError::TagOutOfRange {
                token,
                field: field.name().to_string(),
            });
        }
        if used_ids.contains(&id) {
            return Err(MetadataError::TagInUse {
                token,
                field: field.name().to_string(),
            });
        }
        used_ids.push(id);

        let type_expr = parse_field_type(&class, field, &field_doc, &resolver)?;

        fields.push(FieldMeta {
            name: field.name().to_string(),
            id: id as u8,
            type_expr,
            as_float32: field_doc.has_tag("kphp-serialized-float32"),
        });
    }

    Ok(InstanceMeta { class, fields })
}

/// The field type comes from `@var` when present, else from the native
/// type hint rendered back to source form (`?\Ns\Class`).
fn parse_field_type(
    class: &Arc<ClassDef>,
    field: &FieldDef,
    field_doc: &DocComment,
    resolver: &UseResolver,
) -> Result<TypeExpr, MetadataError> {
    let bad = |message: String| MetadataError::BadFieldType {
        class: class.name().to_string(),
        field: field.name().to_string(),
        message,
    };

    let type_str = match field_doc.tag("var") {
        Some(tag) => tag.value.clone(),
        None => match field.type_hint() {
            Some(hint) => {
                let mut s = String::new();
                if hint.nullable {
                    s.push('?');
                }
                if !hint.builtin {
                    s.push('\\');
                }
                s.push_str(&hint.name);
                s
            }
            None => String::new(),
        },
    };

    if type_str.is_empty() {
        return Err(bad("no @var above".to_string()));
    }

    let mut rest = type_str.as_str();
    match parse(&mut rest, resolver) {
        Ok(Some(expr)) => Ok(expr),
        Ok(None) => Err(bad("@var has invalid or unsupported format".to_string())),
        Err(err) => Err(bad(err.to_string())),
    }
}

/// The first whitespace-delimited token of the tag value, when it is a
/// run of digits or the literal `none`. Anything else counts as an
/// absent tag.
fn serialized_field_token(value: &str) -> Option<String> {
    let token = value.split_whitespace().next()?;
    if token == "none" || token.bytes().all(|b| b.is_ascii_digit()) {
        Some(token.to_string())
    } else {
        None
    }
}

/// Parses `[1, 2, 3]` (or `[]`) into a list of reserved tag ids.
fn parse_reserved_ids(value: &str) -> Option<Vec<i64>> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    let mut ids = Vec::new();
    for token in inner.split(',') {
        let token = token.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id: i64 = token.parse().ok()?;
        if id > 127 {
            return None;
        }
        ids.push(id);
    }
    Some(ids)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
