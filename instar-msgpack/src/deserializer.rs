//! MessagePack-to-instance decoding.

use instar_core::{Instance, InstanceRef, VArray, Value};
use instar_phpdoc::TypeExpr;

use crate::error::MsgPackError;
use crate::metadata::instance_metadata;
use crate::verify::{primitive_fits, value_repr};

/// Rebuilds an instance from an unpacked tag/value sequence.
///
/// Metadata is resolved before the null check, so an unserializable
/// class is reported even when the payload is nil. Unknown tags are
/// skipped; a tag appearing twice keeps the later value. Fields absent
/// from the payload keep their declared defaults.
pub(crate) fn from_unpacked_instance(
    unpacked: &Value,
    class_name: &str,
) -> Result<Option<InstanceRef>, MsgPackError> {
    let meta = instance_metadata(class_name)?;
    if unpacked.is_null() {
        return Ok(None);
    }
    let Value::Array(arr) = unpacked else {
        return Err(MsgPackError::TopLevelNotSequence);
    };
    if arr.len() % 2 != 0 {
        return Err(MsgPackError::TopLevelNotSequence);
    }

    let inst = Instance::instantiate_ref(meta.class())?;
    {
        let mut obj = inst.borrow_mut();
        let mut items = arr.values();
        while let (Some(tag_value), Some(raw)) = (items.next(), items.next()) {
            let Value::Int(tag) = tag_value else {
                return Err(MsgPackError::TopLevelNotSequence);
            };
            if let Some(field) = meta.field_by_tag(*tag) {
                obj.set(field.name(), from_unpacked_value(raw, field.type_expr())?)?;
            }
        }
    }
    Ok(Some(inst))
}

/// Converts one unpacked value to the shape its declared type asks for.
///
/// Instances are rebuilt recursively; arrays are walked only when the
/// element type mentions an instance, otherwise the unpacked value is
/// taken as-is.
pub(crate) fn from_unpacked_value(value: &Value, expr: &TypeExpr) -> Result<Value, MsgPackError> {
    match expr {
        TypeExpr::Primitive(p) => {
            if primitive_fits(*p, value) {
                Ok(value.clone())
            } else {
                Err(MsgPackError::Verify {
                    message: format!("not primitive: {}", p.keyword()),
                })
            }
        }
        TypeExpr::Instance(class) => Ok(match from_unpacked_instance(value, class)? {
            Some(obj) => Value::Instance(obj),
            None => Value::Null,
        }),
        TypeExpr::Array(inner) => {
            let Value::Array(arr) = value else {
                return Err(MsgPackError::Verify {
                    message: format!("not an array: {}", value_repr(value)),
                });
            };
            if !inner.has_instance_inside() {
                return Ok(value.clone());
            }
            let mut rebuilt = VArray::new();
            for (key, item) in arr.iter() {
                rebuilt.insert(key.clone(), from_unpacked_value(item, inner)?);
            }
            Ok(Value::Array(rebuilt))
        }
        TypeExpr::Tuple(types) => {
            let Value::Array(arr) = value else {
                return Err(MsgPackError::Verify {
                    message: format!("can't assign to type '{expr}' from {}", value_repr(value)),
                });
            };
            if arr.len() != types.len() {
                return Err(MsgPackError::Verify {
                    message: format!("can't assign to type '{expr}' from {}", value_repr(value)),
                });
            }
            let mut items = Vec::with_capacity(types.len());
            for (item, ty) in arr.values().zip(types) {
                items.push(from_unpacked_value(item, ty)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeExpr::Or(a, b) => {
            from_unpacked_value(value, a).or_else(|_| from_unpacked_value(value, b))
        }
    }
}
