//! Per-class, per-encoder JSON policy.
//!
//! Built once per (class, encoder) pair from docblocks and cached for
//! the life of the process. Construction merges three tiers into final
//! per-field settings: the encoder's constants, the class's
//! `@kphp-json` tags, the field's own tags. It also validates the
//! whole policy up front: attribute placement, the flatten shape,
//! key uniqueness, and one parseable type per field. A class that
//! fails validation fails the same way on every use; failures are not
//! cached.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use instar_core::{ClassDef, ClassRegistry, ConstValue, DocComment, FieldDef};
use instar_phpdoc::{TypeExpr, UseResolver, parse};
use tracing::warn;

use crate::encoder::{self, JsonEncoder, VisibilityPolicy, read_lock, write_lock};
use crate::error::JsonPolicyError;
use crate::tags::{JsonAttr, TagList};

/// One field's final JSON settings after the tiers are merged.
#[derive(Debug)]
pub struct FieldPolicy {
    name: String,
    json_key: String,
    skip_when_encoding: bool,
    skip_when_decoding: bool,
    skip_if_default: bool,
    array_as_hashmap: bool,
    required: bool,
    raw_string: bool,
    float_precision: u32,
    type_expr: TypeExpr,
    default: Option<ConstValue>,
}

impl FieldPolicy {
    /// Field name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The JSON object key this field reads and writes.
    pub fn json_key(&self) -> &str {
        &self.json_key
    }

    /// Whether encoding leaves this field out.
    pub fn skip_when_encoding(&self) -> bool {
        self.skip_when_encoding
    }

    /// Whether decoding ignores this field.
    pub fn skip_when_decoding(&self) -> bool {
        self.skip_when_decoding
    }

    /// Whether a value equal to the declared default is left out.
    pub fn skip_if_default(&self) -> bool {
        self.skip_if_default
    }

    /// Whether arrays here always become JSON objects.
    pub fn array_as_hashmap(&self) -> bool {
        self.array_as_hashmap
    }

    /// Whether decoding demands the key to be present.
    pub fn required(&self) -> bool {
        self.required
    }

    /// Whether the string value is a pre-encoded JSON fragment.
    pub fn raw_string(&self) -> bool {
        self.raw_string
    }

    /// Float precision for the subtree; zero means full precision.
    pub fn float_precision(&self) -> u32 {
        self.float_precision
    }

    /// The field's parsed type.
    pub fn type_expr(&self) -> &TypeExpr {
        &self.type_expr
    }

    /// Whether the field's type admits null.
    pub fn nullable(&self) -> bool {
        self.type_expr.is_null_allowed()
    }

    /// The declared default value, if any.
    pub fn default_value(&self) -> Option<&ConstValue> {
        self.default.as_ref()
    }
}

/// JSON policy for one class under one encoder.
#[derive(Debug)]
pub struct ClassPolicy {
    class: Arc<ClassDef>,
    parent: Option<Arc<ClassPolicy>>,
    flatten: bool,
    fields: Vec<FieldPolicy>,
    encode_order: Option<Vec<usize>>,
}

impl ClassPolicy {
    /// The class this policy describes.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Fully-qualified class name.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// The parent class's policy under the same encoder.
    pub fn parent(&self) -> Option<&Arc<ClassPolicy>> {
        self.parent.as_ref()
    }

    /// Whether the class serializes as its single field's bare value.
    pub fn flatten(&self) -> bool {
        self.flatten
    }

    /// Own fields in declaration order, statics excluded.
    pub fn fields(&self) -> &[FieldPolicy] {
        &self.fields
    }

    /// Own fields in output order: the order of the class's `fields`
    /// directive when one is in effect, declaration order otherwise.
    pub fn encode_fields(&self) -> Vec<&FieldPolicy> {
        match &self.encode_order {
            Some(order) => order.iter().map(|&i| &self.fields[i]).collect(),
            None => self.fields.iter().collect(),
        }
    }
}

type Cache = RwLock<HashMap<String, Arc<ClassPolicy>>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the cached policy for `class_name` under `encoder_name`,
/// building it on first use. Concurrent first calls may build twice;
/// one copy wins.
pub fn class_policy(
    class_name: &str,
    encoder_name: &str,
) -> Result<Arc<ClassPolicy>, JsonPolicyError> {
    let class_key = class_name.strip_prefix('\\').unwrap_or(class_name);
    let encoder_key = encoder_name.strip_prefix('\\').unwrap_or(encoder_name);
    let key = format!("{class_key}_{encoder_key}");
    if let Some(policy) = read_lock(cache()).get(&key) {
        return Ok(Arc::clone(policy));
    }
    let built = Arc::new(build(class_key, encoder_key)?);
    let mut map = write_lock(cache());
    let entry = map.entry(key).or_insert(built);
    Ok(Arc::clone(entry))
}

fn build(class_name: &str, encoder_name: &str) -> Result<ClassPolicy, JsonPolicyError> {
    let class = ClassRegistry::global().get_or_err(class_name)?;
    let encoder = encoder::json_encoder(encoder_name)?;

    // parents resolve through the same cache, before this class's own
    // tags are even looked at
    let parent = match class.parent()? {
        Some(parent) => Some(class_policy(parent.name(), encoder_name)?),
        None => None,
    };

    let resolver = UseResolver::for_class(&class);
    let class_tags =
        TagList::from_doc(class.doc_text(), &resolver).map_err(|err| at_class(&class, err))?;
    if let Some(tags) = &class_tags {
        if let Some(tag) = tags.tags().iter().find(|t| !t.attr.allowed_above_class()) {
            return Err(at_class(
                &class,
                JsonPolicyError::AttrAboveClass {
                    attr: tag.attr.name().to_string(),
                },
            ));
        }
    }

    // the flatten marker ignores `for` scoping; its per-field resets
    // below do not
    let flatten = class_tags.as_ref().map_or(false, TagList::any_flatten);

    let mut fields = Vec::new();
    let mut tagged_fields = Vec::new();
    for field in class.fields() {
        if field.is_static() {
            continue;
        }
        match build_field(class_tags.as_ref(), &encoder, encoder_name, field, &resolver) {
            Ok((policy, tagged)) => {
                if tagged {
                    tagged_fields.push(policy.name.clone());
                }
                fields.push(policy);
            }
            Err(err) => {
                let wrapped = at_field(&class, field, err);
                warn!("{wrapped}");
                return Err(wrapped);
            }
        }
    }

    if flatten {
        if fields.len() != 1 {
            return Err(JsonPolicyError::FlattenFieldCount {
                class: class.name().to_string(),
            });
        }
        if let Some(field) = tagged_fields.first() {
            return Err(JsonPolicyError::FlattenFieldTagged {
                class: class.name().to_string(),
                field: field.clone(),
            });
        }
    }

    if let Some(tags) = &class_tags {
        for tag in tags.tags() {
            if let JsonAttr::Fields(names) = &tag.attr {
                for name in names {
                    if !fields.iter().any(|f| f.name == *name) {
                        return Err(JsonPolicyError::FieldsUnknownField {
                            class: class.name().to_string(),
                            field: name.clone(),
                        });
                    }
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.json_key.as_str()) {
            return Err(JsonPolicyError::DuplicateJsonKey {
                class: class.name().to_string(),
                key: field.json_key.clone(),
            });
        }
    }

    let mut encode_order = None;
    let order_tag = class_tags.as_ref().and_then(|tags| {
        tags.find(encoder_name, |a| match a {
            JsonAttr::Fields(names) => Some(names.clone()),
            _ => None,
        })
    });
    if let Some(names) = order_tag {
        let mut order = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(pos) = fields.iter().position(|f| f.name == *name) {
                order.push(pos);
            }
        }
        encode_order = Some(order);
    }

    Ok(ClassPolicy {
        class,
        parent,
        flatten,
        fields,
        encode_order,
    })
}

/// Merges encoder constants, class tags and field tags into one field's
/// settings, the later tier overriding the earlier.
fn build_field(
    class_tags: Option<&TagList>,
    encoder: &JsonEncoder,
    encoder_name: &str,
    field: &FieldDef,
    resolver: &UseResolver,
) -> Result<(FieldPolicy, bool), JsonPolicyError> {
    let field_tags = TagList::from_doc(field.doc_text(), resolver)?;
    if let Some(tags) = &field_tags {
        if let Some(tag) = tags.tags().iter().find(|t| !t.attr.allowed_above_field()) {
            return Err(JsonPolicyError::AttrAboveField {
                attr: tag.attr.name().to_string(),
            });
        }
    }

    let type_expr = parse_field_type(field, resolver)?;
    let default = field.default_value().cloned();

    // a field that starts uninitialized and cannot hold null must be
    // present in the incoming json, unless `required=false` says
    // otherwise below
    let default_is_null = default
        .as_ref()
        .map_or(true, |d| matches!(d, ConstValue::Null));
    let mut required = default_is_null && !type_expr.is_null_allowed();

    // encoder constants, each overridable by the last class tag in
    // effect under this encoder
    let rename_policy = class_tags
        .and_then(|t| {
            t.find(encoder_name, |a| match a {
                JsonAttr::RenamePolicy(p) => Some(*p),
                _ => None,
            })
        })
        .unwrap_or(encoder.rename_policy());
    let visibility = class_tags
        .and_then(|t| {
            t.find(encoder_name, |a| match a {
                JsonAttr::VisibilityPolicy(p) => Some(*p),
                _ => None,
            })
        })
        .unwrap_or(encoder.visibility_policy());
    let mut skip_if_default = class_tags
        .and_then(|t| {
            t.find(encoder_name, |a| match a {
                JsonAttr::SkipIfDefault(v) => Some(*v),
                _ => None,
            })
        })
        .unwrap_or(encoder.skip_if_default());
    let mut float_precision = class_tags
        .and_then(|t| {
            t.find(encoder_name, |a| match a {
                JsonAttr::FloatPrecision(p) => Some(*p),
                _ => None,
            })
        })
        .unwrap_or(encoder.float_precision());

    let mut json_key = rename_policy.apply(field.name());
    let hidden = match visibility {
        VisibilityPolicy::All => false,
        VisibilityPolicy::Public => !field.is_public(),
    };
    let mut skip_when_encoding = hidden;
    let mut skip_when_decoding = hidden;

    // class-only attributes, in declaration order
    if let Some(tags) = class_tags {
        for tag in tags.tags().iter().filter(|t| t.applies_to(encoder_name)) {
            match &tag.attr {
                JsonAttr::Flatten(_) => {
                    skip_if_default = false;
                    skip_when_encoding = false;
                    skip_when_decoding = false;
                }
                JsonAttr::Fields(names) => {
                    let listed = names.iter().any(|n| n == field.name());
                    skip_when_encoding = !listed;
                    skip_when_decoding = !listed;
                }
                _ => {}
            }
        }
    }

    // the field's own tags override everything above
    let mut array_as_hashmap = false;
    let mut raw_string = false;
    if let Some(tags) = &field_tags {
        for tag in tags.tags().iter().filter(|t| t.applies_to(encoder_name)) {
            match &tag.attr {
                JsonAttr::Rename(key) => json_key = key.clone(),
                JsonAttr::Skip(skip) => {
                    skip_when_encoding = skip.when_encoding();
                    skip_when_decoding = skip.when_decoding();
                }
                JsonAttr::ArrayAsHashmap(v) => array_as_hashmap = *v,
                JsonAttr::RawString(v) => raw_string = *v,
                JsonAttr::Required(v) => required = *v,
                JsonAttr::FloatPrecision(p) => float_precision = *p,
                JsonAttr::SkipIfDefault(v) => skip_if_default = *v,
                _ => {}
            }
        }
    }

    Ok((
        FieldPolicy {
            name: field.name().to_string(),
            json_key,
            skip_when_encoding,
            skip_when_decoding,
            skip_if_default,
            array_as_hashmap,
            required,
            raw_string,
            float_precision,
            type_expr,
            default,
        },
        field_tags.is_some(),
    ))
}

/// The field type comes from `@var` when present, else from the native
/// type hint rendered back to source form (`?\Ns\Class`).
fn parse_field_type(field: &FieldDef, resolver: &UseResolver) -> Result<TypeExpr, JsonPolicyError> {
    let doc = DocComment::parse(field.doc_text().unwrap_or(""));
    let type_str = match doc.tag("var") {
        Some(tag) => tag.value.clone(),
        None => {
            let Some(hint) = field.type_hint() else {
                return Err(JsonPolicyError::NoVarAbove);
            };
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
    };

    let mut rest = type_str.as_str();
    match parse(&mut rest, resolver) {
        Ok(Some(expr)) => Ok(expr),
        Ok(None) => Err(JsonPolicyError::BadVarFormat),
        Err(err) => Err(err.into()),
    }
}

fn at_class(class: &ClassDef, err: JsonPolicyError) -> JsonPolicyError {
    JsonPolicyError::AtClass {
        class: class.name().to_string(),
        message: err.to_string(),
    }
}

fn at_field(class: &ClassDef, field: &FieldDef, err: JsonPolicyError) -> JsonPolicyError {
    JsonPolicyError::AtField {
        class: class.name().to_string(),
        field: field.name().to_string(),
        message: err.to_string(),
    }
}
