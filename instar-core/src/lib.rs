#![warn(missing_docs)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

mod array;
pub use array::{ArrayKey, VArray};

mod value;
pub use value::{ConstValue, Value};

mod class;
pub use class::{ClassDef, ClassDefBuilder, FieldDef, TypeHint, Visibility, WakeupFn};

mod registry;
pub use registry::ClassRegistry;

mod instance;
pub use instance::{Instance, InstanceRef};

mod docblock;
pub use docblock::{DocComment, DocTag};

mod error;
pub use error::CoreError;
