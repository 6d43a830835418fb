#![warn(missing_docs)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

pub use instar_core::*;

pub use instar_phpdoc::*;

pub use instar_msgpack::*;

pub use instar_json::*;
