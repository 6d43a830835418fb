#![warn(missing_docs)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

mod ast;
pub use ast::{Primitive, TypeExpr};

mod parser;
pub use parser::parse;

mod resolver;
pub use resolver::UseResolver;

mod error;
pub use error::TypeParseError;
