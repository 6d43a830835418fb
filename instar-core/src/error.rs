use core::fmt;

/// Errors from the object model itself (registry and field access).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A class with this fully-qualified name is already registered.
    ClassAlreadyRegistered {
        /// Fully-qualified class name.
        name: String,
    },
    /// No class with this fully-qualified name has been registered.
    UnknownClass {
        /// Fully-qualified class name.
        name: String,
    },
    /// The class chain declares no field with this name.
    NoSuchField {
        /// Fully-qualified class name.
        class: String,
        /// Field name.
        field: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ClassAlreadyRegistered { name } => {
                write!(f, "class {name} is already registered")
            }
            CoreError::UnknownClass { name } => {
                write!(f, "class {name} does not exist")
            }
            CoreError::NoSuchField { class, field } => {
                write!(f, "class {class} has no field ${field}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
