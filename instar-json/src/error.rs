use core::fmt;

use instar_core::CoreError;
use instar_phpdoc::TypeParseError;

/// Errors raised while parsing `@kphp-json` tags and building per-class
/// JSON policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPolicyError {
    /// An attribute that needs `= value` was written bare.
    MissingValue {
        /// Attribute name.
        attr: String,
    },
    /// A boolean attribute got something other than empty/true/false.
    BadBool {
        /// Attribute name.
        attr: String,
        /// The right-hand side as written.
        rhs: String,
    },
    /// `skip` got a value outside true/false/encode/decode.
    BadSkip {
        /// The right-hand side as written.
        rhs: String,
    },
    /// `float_precision` is not a non-negative integer.
    BadFloatPrecision {
        /// The right-hand side as written.
        rhs: String,
    },
    /// `visibility_policy` is neither `all` nor `public`.
    BadVisibilityPolicy {
        /// The right-hand side as written.
        rhs: String,
    },
    /// `rename_policy` is not one of none/snake_case/camelCase.
    BadRenamePolicy {
        /// The right-hand side as written.
        rhs: String,
    },
    /// An attribute name this codec does not know.
    UnknownAttr {
        /// Attribute name.
        attr: String,
    },
    /// `for` with no encoder name and attribute after it.
    NothingAfterFor,
    /// The encoder named after `for` is not registered.
    UnknownForEncoder {
        /// Resolved encoder name.
        fqn: String,
    },
    /// A field-only attribute was written above a class.
    AttrAboveClass {
        /// Attribute name.
        attr: String,
    },
    /// A class-only attribute was written above a field.
    AttrAboveField {
        /// Attribute name.
        attr: String,
    },
    /// A field with neither `@var` nor a native type hint.
    NoVarAbove,
    /// A field type text that does not start with a recognizable type.
    BadVarFormat,
    /// A field type text that parses up to a hard error.
    Type(TypeParseError),
    /// A failure while handling a class's own tags.
    AtClass {
        /// Fully-qualified class name.
        class: String,
        /// The underlying failure.
        message: String,
    },
    /// A failure while handling one field's tags or type.
    AtField {
        /// Fully-qualified class name.
        class: String,
        /// Field name.
        field: String,
        /// The underlying failure.
        message: String,
    },
    /// A flatten class declares zero or several fields.
    FlattenFieldCount {
        /// Fully-qualified class name.
        class: String,
    },
    /// The single field of a flatten class carries its own tags.
    FlattenFieldTagged {
        /// Fully-qualified class name.
        class: String,
        /// Field name.
        field: String,
    },
    /// Two fields map to the same JSON key after renames.
    DuplicateJsonKey {
        /// Fully-qualified class name.
        class: String,
        /// The colliding key.
        key: String,
    },
    /// A `fields` directive lists a name that is not a declared field.
    FieldsUnknownField {
        /// Fully-qualified class name.
        class: String,
        /// The unknown name.
        field: String,
    },
    /// An encoder name passed to an entry point is not registered.
    UnknownEncoder {
        /// Encoder name.
        name: String,
    },
    /// An encoder with this name is already registered.
    DuplicateEncoder {
        /// Encoder name.
        name: String,
    },
    /// Registry lookup failure while walking the class chain.
    Core(CoreError),
}

impl fmt::Display for JsonPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonPolicyError::MissingValue { attr } => {
                write!(f, "@kphp-json '{attr}' expected to have a value after '='")
            }
            JsonPolicyError::BadBool { attr, rhs } => {
                write!(f, "@kphp-json '{attr}' should be empty or true|false, got '{rhs}'")
            }
            JsonPolicyError::BadSkip { rhs } => {
                write!(f, "@kphp-json 'skip' should be true|false|encode|decode, got '{rhs}'")
            }
            JsonPolicyError::BadFloatPrecision { rhs } => {
                write!(
                    f,
                    "@kphp-json 'float_precision' value should be non negative integer, got '{rhs}'"
                )
            }
            JsonPolicyError::BadVisibilityPolicy { rhs } => {
                write!(f, "@kphp-json 'visibility_policy' should be all|public, got '{rhs}'")
            }
            JsonPolicyError::BadRenamePolicy { rhs } => {
                write!(
                    f,
                    "@kphp-json 'rename_policy' should be none|snake_case|camelCase, got '{rhs}'"
                )
            }
            JsonPolicyError::UnknownAttr { attr } => {
                write!(f, "Unknown @kphp-json '{attr}'")
            }
            JsonPolicyError::NothingAfterFor => write!(f, "Nothing after @kphp-json for"),
            JsonPolicyError::UnknownForEncoder { fqn } => {
                write!(f, "Class {fqn} not found after @kphp-json for")
            }
            JsonPolicyError::AttrAboveClass { attr } => {
                write!(f, "@kphp-json '{attr}' is allowed above fields, not above classes")
            }
            JsonPolicyError::AttrAboveField { attr } => {
                write!(f, "@kphp-json '{attr}' is allowed above classes, not above fields")
            }
            JsonPolicyError::NoVarAbove => write!(f, "no @var above"),
            JsonPolicyError::BadVarFormat => {
                write!(f, "@var has unsupported or invalid format")
            }
            JsonPolicyError::Type(err) => err.fmt(f),
            JsonPolicyError::AtClass { class, message } => {
                write!(f, "Error at class {class}: {message}")
            }
            JsonPolicyError::AtField { class, field, message } => {
                write!(f, "Error at field {class}::${field}: {message}")
            }
            JsonPolicyError::FlattenFieldCount { class } => {
                write!(f, "Flatten class {class} must have exactly one field")
            }
            JsonPolicyError::FlattenFieldTagged { class, field } => {
                write!(
                    f,
                    "Field {class}::${field} of a flatten class must not have @kphp-json tags"
                )
            }
            JsonPolicyError::DuplicateJsonKey { class, key } => {
                write!(f, "Json key '{key}' appears twice in class {class}")
            }
            JsonPolicyError::FieldsUnknownField { class, field } => {
                write!(f, "@kphp-json 'fields' lists unknown field '{field}' of class {class}")
            }
            JsonPolicyError::UnknownEncoder { name } => {
                write!(f, "json encoder {name} is not registered")
            }
            JsonPolicyError::DuplicateEncoder { name } => {
                write!(f, "json encoder {name} is already registered")
            }
            JsonPolicyError::Core(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for JsonPolicyError {}

impl From<CoreError> for JsonPolicyError {
    fn from(err: CoreError) -> Self {
        JsonPolicyError::Core(err)
    }
}

impl From<TypeParseError> for JsonPolicyError {
    fn from(err: TypeParseError) -> Self {
        JsonPolicyError::Type(err)
    }
}

/// Errors raised while encoding an instance to JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonEncodeError {
    /// Objects nested beyond the depth limit.
    DepthLimit,
    /// A non-nullable field was null or never assigned.
    UninitializedField {
        /// Declaring class name.
        class: String,
        /// Field name.
        field: String,
    },
    /// Tuples have no JSON form.
    TupleUnsupported,
    /// `write_key` outside an object level.
    KeyOutsideObject,
    /// A second top-level value after the root completed.
    SecondRootValue,
    /// `end_*` with no open level.
    BraceDisbalance,
    /// `end_*` of the wrong kind for the open level.
    EnclosureMismatch {
        /// Whether the open level is an array.
        array_open: bool,
    },
    /// The writer finished with unclosed levels or no root.
    IncompleteJson,
    /// Policy extraction failed for a class on the encode path.
    Policy(JsonPolicyError),
}

impl fmt::Display for JsonEncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonEncodeError::DepthLimit => {
                write!(f, "allowed depth=64 of json object exceeded")
            }
            JsonEncodeError::UninitializedField { class, field } => {
                write!(f, "field {class}::${field} seems to be uninitialized")
            }
            JsonEncodeError::TupleUnsupported => write!(f, "tuples are not supported in json"),
            JsonEncodeError::KeyOutsideObject => {
                write!(f, "json key is allowed only inside object")
            }
            JsonEncodeError::SecondRootValue => {
                write!(f, "attempt to set value twice in a root of json")
            }
            JsonEncodeError::BraceDisbalance => write!(f, "brace disbalance"),
            JsonEncodeError::EnclosureMismatch { array_open } => {
                let (open, close) = if *array_open { ('[', '}') } else { ('{', ']') };
                write!(f, "attempt to enclosure {open} with {close}")
            }
            JsonEncodeError::IncompleteJson => {
                write!(f, "internal error: resulted in incomplete json")
            }
            JsonEncodeError::Policy(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for JsonEncodeError {}

impl From<JsonPolicyError> for JsonEncodeError {
    fn from(err: JsonPolicyError) -> Self {
        JsonEncodeError::Policy(err)
    }
}

/// Errors raised while decoding JSON into an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonDecodeError {
    /// The input is not valid JSON.
    Malformed {
        /// The parser's message.
        message: String,
    },
    /// The root of the document is not an object.
    RootNotObject {
        /// Host-runtime type name of the root value.
        type_name: String,
    },
    /// A value does not fit the field's declared type.
    UnexpectedType {
        /// Host-runtime type name of the offending value.
        type_name: String,
        /// JSON path to the value.
        path: String,
    },
    /// A key marked required is absent.
    AbsentRequiredField {
        /// The missing JSON key.
        key: String,
        /// JSON path of the enclosing object.
        path: String,
    },
    /// Tuples have no JSON form.
    TupleUnsupported {
        /// JSON path to the value.
        path: String,
    },
    /// Policy extraction failed for a class on the decode path.
    Policy(JsonPolicyError),
    /// Instantiation or field assignment failure.
    Core(CoreError),
}

impl fmt::Display for JsonDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonDecodeError::Malformed { message } => write!(f, "malformed json: {message}"),
            JsonDecodeError::RootNotObject { type_name } => {
                write!(f, "root element of json string must be an object type, got {type_name}")
            }
            JsonDecodeError::UnexpectedType { type_name, path } => {
                write!(f, "unexpected type {type_name} for key {path}")
            }
            JsonDecodeError::AbsentRequiredField { key, path } => {
                write!(f, "absent required field '{key}' at {path}")
            }
            JsonDecodeError::TupleUnsupported { path } => {
                write!(f, "tuples are not supported in json: {path}")
            }
            JsonDecodeError::Policy(err) => err.fmt(f),
            JsonDecodeError::Core(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for JsonDecodeError {}

impl From<JsonPolicyError> for JsonDecodeError {
    fn from(err: JsonPolicyError) -> Self {
        JsonDecodeError::Policy(err)
    }
}

impl From<CoreError> for JsonDecodeError {
    fn from(err: CoreError) -> Self {
        JsonDecodeError::Core(err)
    }
}

impl From<serde_json::Error> for JsonDecodeError {
    fn from(err: serde_json::Error) -> Self {
        JsonDecodeError::Malformed {
            message: err.to_string(),
        }
    }
}
