use core::fmt;

use instar_core::CoreError;

/// Errors raised while extracting serialization metadata from a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The class does not carry the `@kphp-serializable` tag.
    NotSerializable {
        /// Fully-qualified class name.
        class: String,
    },
    /// The class is abstract, an interface, or part of an inheritance
    /// chain where more than one class declares instance fields.
    Polymorphic {
        /// Fully-qualified class name.
        class: String,
    },
    /// The `@kphp-reserved-fields` tag is not a list of integers in
    /// `[0, 127]`.
    BadReservedFields {
        /// Fully-qualified class name.
        class: String,
    },
    /// A static field carries `@kphp-serialized-field`.
    StaticFieldTagged {
        /// Field name.
        field: String,
    },
    /// An instance field has no `@kphp-serialized-field` tag.
    MissingFieldTag {
        /// Field name.
        field: String,
    },
    /// The field tag is not an integer in `[0, 127]`.
    TagOutOfRange {
        /// The token that was parsed as a tag.
        token: String,
        /// Field name.
        field: String,
    },
    /// The field tag collides with another field or a reserved id.
    TagInUse {
        /// The tag token as written in the docblock.
        token: String,
        /// Field name.
        field: String,
    },
    /// The field's `@var` (or type hint) failed to parse.
    BadFieldType {
        /// Fully-qualified class name.
        class: String,
        /// Field name.
        field: String,
        /// The underlying parse failure.
        message: String,
    },
    /// Registry lookup failure while walking the class chain.
    Core(CoreError),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::NotSerializable { class } => {
                write!(f, "add @kphp-serializable phpdoc to class: {class}")
            }
            MetadataError::Polymorphic { class } => {
                write!(
                    f,
                    "You may not serialize interfaces/abstract classes/polymorphic classes: {class}"
                )
            }
            MetadataError::BadReservedFields { class } => {
                write!(
                    f,
                    "incorrect kphp-reserved-fields (it should be an array of integers in [0, 127]): {class}"
                )
            }
            MetadataError::StaticFieldTagged { field } => {
                write!(
                    f,
                    "@kphp-serialized-field tag is forbidden for static fields: {field}"
                )
            }
            MetadataError::MissingFieldTag { field } => {
                write!(f, "You should add @kphp-serialized-field phpdoc to field: {field}")
            }
            MetadataError::TagOutOfRange { token, field } => {
                write!(f, "id={token} is not in the range [0, 127], field: {field}")
            }
            MetadataError::TagInUse { token, field } => {
                write!(f, "id={token} is already in use, field: {field}")
            }
            MetadataError::BadFieldType { class, field, message } => {
                write!(f, "Error parsing phpdoc of field {class}::${field}: {message}")
            }
            MetadataError::Core(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<CoreError> for MetadataError {
    fn from(err: CoreError) -> Self {
        MetadataError::Core(err)
    }
}

/// Errors raised while decoding MessagePack bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackError {
    /// The input ended before the value did.
    UnexpectedEof,
    /// The whole input was not consumed by one value.
    TrailingBytes {
        /// Bytes consumed by the first value.
        consumed: usize,
        /// Total input length.
        total: usize,
    },
    /// A byte that is not a valid MessagePack prefix.
    UnknownPrefix {
        /// The offending byte.
        byte: u8,
    },
    /// Extension types are not part of this encoding.
    ExtUnsupported,
    /// An unsigned integer too large for `i64`.
    IntOverflow,
    /// Containers nested beyond the decoder's depth limit.
    NestingTooDeep,
    /// A map key that is neither an integer nor a string.
    BadMapKey,
    /// A str payload that is not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnpackError::UnexpectedEof => write!(f, "unexpected end of input"),
            UnpackError::TrailingBytes { consumed, total } => {
                write!(
                    f,
                    "Consumed only first {consumed} characters of {total} during deserialization"
                )
            }
            UnpackError::UnknownPrefix { byte } => {
                write!(f, "unknown msgpack prefix byte 0x{byte:02x}")
            }
            UnpackError::ExtUnsupported => write!(f, "msgpack ext types are not supported"),
            UnpackError::IntOverflow => write!(f, "integer does not fit into 64 bits"),
            UnpackError::NestingTooDeep => write!(f, "msgpack containers nested too deeply"),
            UnpackError::BadMapKey => write!(f, "map key is neither an integer nor a string"),
            UnpackError::InvalidUtf8 => write!(f, "str payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for UnpackError {}

/// Errors raised by instance serialization and deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgPackError {
    /// Instances nested beyond the serialization depth limit.
    RecursionLimit,
    /// A value does not match the field's declared type.
    Verify {
        /// Human-readable mismatch description.
        message: String,
    },
    /// Metadata extraction failed for the class being serialized.
    Metadata(MetadataError),
    /// Byte-level decoding failed.
    Unpack(UnpackError),
    /// The top-level decoded value is neither nil nor an array.
    TopLevelNotSequence,
    /// A value kind the generic packer cannot represent.
    UnsupportedValue {
        /// PHP-style type name of the value.
        type_name: String,
    },
    /// Registry or field access failure.
    Core(CoreError),
}

impl fmt::Display for MsgPackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgPackError::RecursionLimit => {
                write!(f, "maximum depth of nested instances exceeded")
            }
            MsgPackError::Verify { message } => f.write_str(message),
            MsgPackError::Metadata(err) => err.fmt(f),
            MsgPackError::Unpack(err) => err.fmt(f),
            MsgPackError::TopLevelNotSequence => {
                write!(f, "expected msgpack array of field tags and values")
            }
            MsgPackError::UnsupportedValue { type_name } => {
                write!(f, "cannot pack value of type {type_name}")
            }
            MsgPackError::Core(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MsgPackError {}

impl From<MetadataError> for MsgPackError {
    fn from(err: MetadataError) -> Self {
        MsgPackError::Metadata(err)
    }
}

impl From<UnpackError> for MsgPackError {
    fn from(err: UnpackError) -> Self {
        MsgPackError::Unpack(err)
    }
}

impl From<CoreError> for MsgPackError {
    fn from(err: CoreError) -> Self {
        MsgPackError::Core(err)
    }
}
