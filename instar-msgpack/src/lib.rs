#![warn(missing_docs)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

mod deserializer;
mod serializer;
mod verify;

mod error;
pub use error::{MetadataError, MsgPackError, UnpackError};

mod metadata;
pub use metadata::{FieldMeta, InstanceMeta, instance_metadata};

mod reader;
pub use reader::MsgPackReader;

mod writer;
pub use writer::MsgPackWriter;

use instar_core::{InstanceRef, Value};

/// Serializes an instance to MessagePack bytes.
///
/// Every field is checked against its declared type first; nothing is
/// produced on failure.
pub fn instance_serialize_safe(instance: &InstanceRef) -> Result<Vec<u8>, MsgPackError> {
    let mut w = MsgPackWriter::new();
    serializer::write_instance(&mut w, &instance.borrow(), 0)?;
    Ok(w.into_bytes())
}

/// Tolerant variant of [`instance_serialize_safe`]: failures are logged
/// and swallowed, yielding `None`.
pub fn instance_serialize(instance: &InstanceRef) -> Option<Vec<u8>> {
    match instance_serialize_safe(instance) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::warn!(error = %err, "instance serialization failed");
            None
        }
    }
}

/// Deserializes MessagePack bytes into an instance of `class_name`.
///
/// A nil payload decodes to `Ok(None)`. Trailing bytes after the value
/// are an error.
pub fn instance_deserialize_safe(
    bytes: &[u8],
    class_name: &str,
) -> Result<Option<InstanceRef>, MsgPackError> {
    let unpacked = unpack_value(bytes)?;
    deserializer::from_unpacked_instance(&unpacked, class_name)
}

/// Tolerant variant of [`instance_deserialize_safe`]: failures are
/// logged and swallowed, so both errors and a nil payload come back as
/// `None`.
pub fn instance_deserialize(bytes: &[u8], class_name: &str) -> Option<InstanceRef> {
    match instance_deserialize_safe(bytes, class_name) {
        Ok(instance) => instance,
        Err(err) => {
            tracing::warn!(error = %err, "instance deserialization failed");
            None
        }
    }
}

/// Packs a bare value (no instances) to MessagePack bytes.
pub fn pack_value(value: &Value) -> Result<Vec<u8>, MsgPackError> {
    let mut w = MsgPackWriter::new();
    serializer::write_plain(&mut w, value)?;
    Ok(w.into_bytes())
}

/// Unpacks one MessagePack value, requiring the whole input to be
/// consumed.
pub fn unpack_value(bytes: &[u8]) -> Result<Value, MsgPackError> {
    let mut reader = MsgPackReader::new(bytes);
    let value = reader.read_value()?;
    if reader.remaining() > 0 {
        return Err(UnpackError::TrailingBytes {
            consumed: reader.pos(),
            total: bytes.len(),
        }
        .into());
    }
    Ok(value)
}
