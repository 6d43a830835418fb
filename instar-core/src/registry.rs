use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::class::trim_leading_backslash;
use crate::{ClassDef, CoreError};

static GLOBAL: OnceLock<ClassRegistry> = OnceLock::new();

/// The process-wide class table.
///
/// Classes register exactly once under their fully-qualified name.
/// Lookups tolerate a leading backslash.
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, Arc<ClassDef>>>,
}

impl ClassRegistry {
    /// The global registry.
    pub fn global() -> &'static ClassRegistry {
        GLOBAL.get_or_init(|| ClassRegistry {
            classes: RwLock::new(HashMap::new()),
        })
    }

    /// Registers a class. Fails if the name is already taken.
    pub fn register(&self, def: ClassDef) -> Result<Arc<ClassDef>, CoreError> {
        let mut classes = write_lock(&self.classes);
        if classes.contains_key(def.name()) {
            return Err(CoreError::ClassAlreadyRegistered {
                name: def.name().to_string(),
            });
        }
        let def = Arc::new(def);
        classes.insert(def.name().to_string(), Arc::clone(&def));
        tracing::trace!(class = def.name(), "registered class");
        Ok(def)
    }

    /// Looks up a class by fully-qualified name.
    pub fn get(&self, name: &str) -> Option<Arc<ClassDef>> {
        let name = name.strip_prefix('\\').unwrap_or(name);
        read_lock(&self.classes).get(name).cloned()
    }

    /// Whether a class with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        let name = name.strip_prefix('\\').unwrap_or(name);
        read_lock(&self.classes).contains_key(name)
    }

    /// Looks up a class, erroring with the name as given when absent.
    pub fn get_or_err(&self, name: &str) -> Result<Arc<ClassDef>, CoreError> {
        self.get(name).ok_or_else(|| CoreError::UnknownClass {
            name: trim_leading_backslash(name.to_string()),
        })
    }
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
