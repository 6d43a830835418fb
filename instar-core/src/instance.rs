use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::{ClassDef, CoreError, Value};

/// Shared handle to an [`Instance`]. Object graphs may alias and cycle;
/// the codecs bound traversal with depth limits.
pub type InstanceRef = Rc<RefCell<Instance>>;

/// A live object: a class definition plus its field values.
///
/// A field with no entry is uninitialized, which is distinct from a field
/// set to [`Value::Null`].
#[derive(Debug)]
pub struct Instance {
    class: Arc<ClassDef>,
    fields: IndexMap<String, Value>,
}

impl Instance {
    /// Creates an instance without running any constructor. Declared
    /// defaults are applied, ancestors first; fields without defaults
    /// start uninitialized.
    pub fn instantiate(class: &Arc<ClassDef>) -> Result<Instance, CoreError> {
        let mut fields = IndexMap::new();
        let mut chain = class.ancestors()?;
        chain.push(Arc::clone(class));
        for def in &chain {
            for field in def.fields() {
                if field.is_static() {
                    continue;
                }
                if let Some(default) = field.default_value() {
                    fields.insert(field.name().to_string(), default.to_value());
                }
            }
        }
        Ok(Instance {
            class: Arc::clone(class),
            fields,
        })
    }

    /// Like [`Instance::instantiate`], wrapped in a shared handle.
    pub fn instantiate_ref(class: &Arc<ClassDef>) -> Result<InstanceRef, CoreError> {
        Ok(Rc::new(RefCell::new(Instance::instantiate(class)?)))
    }

    /// The class this instance belongs to.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Reads a field. `None` means the field is uninitialized.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Writes a field. The field must be declared somewhere in the
    /// class chain.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), CoreError> {
        if self.class.field_in_chain(name)?.is_none() {
            return Err(CoreError::NoSuchField {
                class: self.class.name().to_string(),
                field: name.to_string(),
            });
        }
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Whether a field currently holds a value.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Initialized fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
