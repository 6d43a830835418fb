#![warn(missing_docs)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

mod deserializer;
mod path;
mod serializer;
mod tags;

mod encoder;
pub use encoder::{
    DEFAULT_ENCODER, JsonEncoder, JsonEncoderBuilder, RenamePolicy, VisibilityPolicy,
    encoder_exists, json_encoder,
};

mod error;
pub use error::{JsonDecodeError, JsonEncodeError, JsonPolicyError};

mod metadata;
pub use metadata::{ClassPolicy, FieldPolicy, class_policy};

mod writer;
pub use writer::JsonWriter;

use instar_core::{InstanceRef, VArray};

/// Output shaping knobs for [`to_json`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFlags {
    /// Indent with two spaces and break lines.
    pub pretty: bool,
    /// Print whole floats as `5.0` instead of `5`.
    pub preserve_zero_fraction: bool,
}

/// Serializes an instance to a JSON string under the named encoder.
///
/// Extra top-level `more` pairs append after the instance fields with
/// their keys written verbatim. A flatten root renders as its field's
/// bare value and ignores `more`.
pub fn to_json(
    instance: &InstanceRef,
    encoder_name: &str,
    flags: &JsonFlags,
    more: &VArray,
) -> Result<String, JsonEncodeError> {
    let mut w = JsonWriter::new(flags.pretty, flags.preserve_zero_fraction);
    serializer::encode_instance(&mut w, &instance.borrow(), encoder_name, 0, Some(more))?;
    if !w.is_complete() {
        return Err(JsonEncodeError::IncompleteJson);
    }
    Ok(w.into_json())
}

/// Deserializes a JSON string into an instance of `class_name`.
///
/// The class policy resolves before the text is parsed, so policy
/// errors surface even for garbage input. Unless the class is marked
/// flatten, the root of the document must be a JSON object.
pub fn from_json(
    json: &str,
    class_name: &str,
    encoder_name: &str,
) -> Result<InstanceRef, JsonDecodeError> {
    let policy = class_policy(class_name, encoder_name)?;
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    if !parsed.is_object() && !policy.flatten() {
        return Err(JsonDecodeError::RootNotObject {
            type_name: deserializer::json_type_name(&parsed).to_string(),
        });
    }
    let mut json_path = path::JsonPath::new();
    match deserializer::decode_instance(class_name, &parsed, &mut json_path, encoder_name)? {
        Some(instance) => Ok(instance),
        // the object-root check already rejected null input
        None => Err(JsonDecodeError::RootNotObject {
            type_name: deserializer::json_type_name(&parsed).to_string(),
        }),
    }
}
