use std::sync::Arc;

use indexmap::IndexMap;

use crate::{ClassRegistry, ConstValue, CoreError, Instance};

/// Field visibility. The codecs never bypass it for access (fields are
/// reached through the registered table), but the JSON policy layer
/// consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `public`
    Public,
    /// `protected`
    Protected,
    /// `private`
    Private,
}

/// A field's native type hint, as declared on the property itself
/// (as opposed to its `@var` docblock line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHint {
    /// Type name: a builtin keyword, or a fully-qualified class name.
    pub name: String,
    /// Whether the hint allows null.
    pub nullable: bool,
    /// True for builtin keywords (`int`, `string`, ..), false for classes.
    pub builtin: bool,
}

impl TypeHint {
    /// A builtin hint such as `int` or `?string`.
    pub fn builtin(name: impl Into<String>) -> TypeHint {
        TypeHint {
            name: name.into(),
            nullable: false,
            builtin: true,
        }
    }

    /// A class hint. The name is stored fully qualified, without a
    /// leading backslash.
    pub fn class(name: impl Into<String>) -> TypeHint {
        TypeHint {
            name: trim_leading_backslash(name.into()),
            nullable: false,
            builtin: false,
        }
    }

    /// Marks the hint nullable (`?T`).
    pub fn nullable(mut self) -> TypeHint {
        self.nullable = true;
        self
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    visibility: Visibility,
    is_static: bool,
    hint: Option<TypeHint>,
    default: Option<ConstValue>,
    doc: Option<String>,
}

impl FieldDef {
    /// A public, non-static field with no hint, default or docblock.
    pub fn new(name: impl Into<String>) -> FieldDef {
        FieldDef {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            hint: None,
            default: None,
            doc: None,
        }
    }

    /// Sets the visibility.
    pub fn visibility(mut self, v: Visibility) -> FieldDef {
        self.visibility = v;
        self
    }

    /// Marks the field static.
    pub fn static_field(mut self) -> FieldDef {
        self.is_static = true;
        self
    }

    /// Sets the native type hint.
    pub fn hint(mut self, hint: TypeHint) -> FieldDef {
        self.hint = Some(hint);
        self
    }

    /// Sets the declared default value.
    pub fn default(mut self, value: impl Into<ConstValue>) -> FieldDef {
        self.default = Some(value.into());
        self
    }

    /// Attaches the field's docblock text.
    pub fn doc(mut self, text: impl Into<String>) -> FieldDef {
        self.doc = Some(text.into());
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field visibility.
    pub fn vis(&self) -> Visibility {
        self.visibility
    }

    /// Whether the field is public.
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether the field is static.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// The native type hint, if declared.
    pub fn type_hint(&self) -> Option<&TypeHint> {
        self.hint.as_ref()
    }

    /// The declared default value, if any. `None` means the field starts
    /// uninitialized.
    pub fn default_value(&self) -> Option<&ConstValue> {
        self.default.as_ref()
    }

    /// The field's docblock text, if any.
    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A post-decode hook, the `__wakeup` equivalent.
pub type WakeupFn = fn(&mut Instance);

/// A registered class: identity, inheritance link, import aliases,
/// docblock text and the ordered field table.
///
/// Built through [`ClassDef::builder`] and registered once in the
/// [`ClassRegistry`]; codecs hold it behind `Arc`.
#[derive(Debug)]
pub struct ClassDef {
    name: String,
    namespace: String,
    parent: Option<String>,
    is_abstract: bool,
    is_interface: bool,
    doc: Option<String>,
    uses: IndexMap<String, String>,
    fields: Vec<FieldDef>,
    wakeup: Option<WakeupFn>,
}

impl ClassDef {
    /// Starts building a class. `name` is the fully-qualified name;
    /// a leading backslash is stripped.
    pub fn builder(name: impl Into<String>) -> ClassDefBuilder {
        let name = trim_leading_backslash(name.into());
        let namespace = match name.rfind('\\') {
            Some(pos) => name[..pos].to_string(),
            None => String::new(),
        };
        ClassDefBuilder {
            def: ClassDef {
                name,
                namespace,
                parent: None,
                is_abstract: false,
                is_interface: false,
                doc: None,
                uses: IndexMap::new(),
                fields: Vec::new(),
                wakeup: None,
            },
        }
    }

    /// Fully-qualified name, without a leading backslash.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name after the last namespace separator.
    pub fn short_name(&self) -> &str {
        match self.name.rfind('\\') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    /// The namespace part of the name, empty for the global namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Parent class fully-qualified name, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Resolves the parent class through the global registry.
    pub fn parent(&self) -> Result<Option<Arc<ClassDef>>, CoreError> {
        match &self.parent {
            None => Ok(None),
            Some(name) => match ClassRegistry::global().get(name) {
                Some(def) => Ok(Some(def)),
                None => Err(CoreError::UnknownClass { name: name.clone() }),
            },
        }
    }

    /// Whether the class is abstract.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether this is an interface.
    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// The class docblock text, if any.
    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Looks up an import alias (`use` table).
    pub fn use_target(&self, alias: &str) -> Option<&str> {
        self.uses.get(alias).map(String::as_str)
    }

    /// The import table, alias to target, in declaration order.
    pub fn uses(&self) -> impl Iterator<Item = (&str, &str)> {
        self.uses.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    /// Declared fields, own only, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up an own field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a field by name through the ancestor chain.
    pub fn field_in_chain(&self, name: &str) -> Result<Option<FieldDef>, CoreError> {
        if let Some(f) = self.field(name) {
            return Ok(Some(f.clone()));
        }
        let mut parent = self.parent()?;
        while let Some(def) = parent {
            if let Some(f) = def.field(name) {
                return Ok(Some(f.clone()));
            }
            parent = def.parent()?;
        }
        Ok(None)
    }

    /// The post-decode hook closest to this class in the chain.
    pub fn wakeup_in_chain(&self) -> Result<Option<WakeupFn>, CoreError> {
        if let Some(w) = self.wakeup {
            return Ok(Some(w));
        }
        let mut parent = self.parent()?;
        while let Some(def) = parent {
            if let Some(w) = def.wakeup {
                return Ok(Some(w));
            }
            parent = def.parent()?;
        }
        Ok(None)
    }

    /// The ancestor chain root-first, excluding this class.
    pub fn ancestors(&self) -> Result<Vec<Arc<ClassDef>>, CoreError> {
        let mut chain = Vec::new();
        let mut parent = self.parent()?;
        while let Some(def) = parent {
            parent = def.parent()?;
            chain.push(def);
        }
        chain.reverse();
        Ok(chain)
    }
}

/// Builder for [`ClassDef`].
pub struct ClassDefBuilder {
    def: ClassDef,
}

impl ClassDefBuilder {
    /// Sets the parent class by fully-qualified name.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.def.parent = Some(trim_leading_backslash(name.into()));
        self
    }

    /// Marks the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.def.is_abstract = true;
        self
    }

    /// Marks this an interface.
    pub fn interface(mut self) -> Self {
        self.def.is_interface = true;
        self
    }

    /// Attaches the class docblock text.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.def.doc = Some(text.into());
        self
    }

    /// Adds an import alias, as from a `use Target as Alias;` line.
    pub fn use_alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.def
            .uses
            .insert(alias.into(), trim_leading_backslash(target.into()));
        self
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.def.fields.push(field);
        self
    }

    /// Sets the post-decode hook.
    pub fn wakeup(mut self, hook: WakeupFn) -> Self {
        self.def.wakeup = Some(hook);
        self
    }

    /// Finishes building without registering.
    pub fn build(self) -> Arc<ClassDef> {
        Arc::new(self.def)
    }

    /// Registers the class in the global [`ClassRegistry`].
    pub fn register(self) -> Result<Arc<ClassDef>, CoreError> {
        ClassRegistry::global().register(self.def)
    }
}

pub(crate) fn trim_leading_backslash(name: String) -> String {
    match name.strip_prefix('\\') {
        Some(rest) => rest.to_string(),
        None => name,
    }
}
