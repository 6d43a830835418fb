//! Runtime checks of values against declared field types.
//!
//! Every field value is verified before it is written. Failures carry
//! the `in field Class::$name:` context of each enclosing instance, so
//! a mismatch deep in a graph names the whole chain. Only the recursion
//! limit is exempt from wrapping; it surfaces as-is.

use instar_core::Value;
use instar_phpdoc::{Primitive, TypeExpr};

use crate::error::MsgPackError;
use crate::metadata::instance_metadata;
use crate::serializer::MAX_INSTANCE_DEPTH;

pub(crate) fn verify_value(
    expr: &TypeExpr,
    value: &Value,
    depth: usize,
) -> Result<(), MsgPackError> {
    match expr {
        TypeExpr::Primitive(p) => {
            if primitive_fits(*p, value) {
                Ok(())
            } else {
                Err(MsgPackError::Verify {
                    message: format!(
                        "can't assign to type '{}' from {}",
                        p.keyword(),
                        value_repr(value)
                    ),
                })
            }
        }
        TypeExpr::Instance(declared) => verify_instance(declared, value, depth),
        TypeExpr::Array(inner) => match value {
            Value::Array(arr) => {
                for item in arr.values() {
                    verify_value(inner, item, depth)?;
                }
                Ok(())
            }
            Value::Tuple(items) => {
                for item in items {
                    verify_value(inner, item, depth)?;
                }
                Ok(())
            }
            other => Err(MsgPackError::Verify {
                message: format!("not array: {}", value_repr(other)),
            }),
        },
        TypeExpr::Tuple(types) => {
            let mismatch = || MsgPackError::Verify {
                message: format!("can't assign to type '{expr}' from {}", value_repr(value)),
            };
            match value {
                Value::Tuple(items) => {
                    if items.len() != types.len() {
                        return Err(mismatch());
                    }
                    for (ty, item) in types.iter().zip(items) {
                        verify_value(ty, item, depth)?;
                    }
                    Ok(())
                }
                Value::Array(arr) => {
                    if arr.len() != types.len() {
                        return Err(mismatch());
                    }
                    for (ty, item) in types.iter().zip(arr.values()) {
                        verify_value(ty, item, depth)?;
                    }
                    Ok(())
                }
                _ => Err(mismatch()),
            }
        }
        TypeExpr::Or(left, right) => {
            verify_value(left, value, depth).or_else(|_| verify_value(right, value, depth))
        }
    }
}

/// `null` always fits an instance slot; `?A` is not needed for that.
/// A live instance must be of exactly the declared class, and its own
/// fields are verified on the way.
fn verify_instance(declared: &str, value: &Value, depth: usize) -> Result<(), MsgPackError> {
    let handle = match value {
        Value::Null => return Ok(()),
        Value::Instance(handle) => handle,
        other => {
            return Err(MsgPackError::Verify {
                message: format!("can't assign to type '{declared}' from {}", value_repr(other)),
            });
        }
    };

    if depth + 1 > MAX_INSTANCE_DEPTH {
        return Err(MsgPackError::RecursionLimit);
    }

    let obj = handle.borrow();
    let meta = instance_metadata(obj.class().name())?;
    let null = Value::Null;
    for field in meta.fields() {
        let field_value = obj.get(field.name()).unwrap_or(&null);
        verify_value(field.type_expr(), field_value, depth + 1)
            .map_err(|err| field_error(meta.class_name(), field.name(), err))?;
    }

    if obj.class().name() != declared {
        return Err(MsgPackError::Verify {
            message: format!(
                "can't assign to type '{declared}' from '{}'",
                obj.class().name()
            ),
        });
    }
    Ok(())
}

/// Wraps a field-level failure with its location. The recursion limit
/// passes through untouched so it is never buried in field context.
pub(crate) fn field_error(class: &str, field: &str, err: MsgPackError) -> MsgPackError {
    match err {
        MsgPackError::RecursionLimit => MsgPackError::RecursionLimit,
        other => MsgPackError::Verify {
            message: format!("in field {class}::${field}: {other}"),
        },
    }
}

pub(crate) fn primitive_fits(p: Primitive, value: &Value) -> bool {
    match p {
        Primitive::Int => matches!(value, Value::Int(_)),
        Primitive::Float => matches!(value, Value::Int(_) | Value::Float(_)),
        Primitive::Str => matches!(value, Value::String(_)),
        Primitive::Bool => matches!(value, Value::Bool(_)),
        Primitive::False => matches!(value, Value::Bool(false)),
        Primitive::True => matches!(value, Value::Bool(true)),
        Primitive::Null => value.is_null(),
        Primitive::Mixed => mixed_fits(value),
        Primitive::Any => true,
    }
}

/// `mixed` admits anything except objects. Arrays are probed at their
/// first and last element only.
fn mixed_fits(value: &Value) -> bool {
    match value {
        Value::Instance(_) => false,
        Value::Array(arr) => match (arr.values().next(), arr.values().last()) {
            (Some(first), Some(last)) => mixed_fits(first) && mixed_fits(last),
            _ => true,
        },
        Value::Tuple(items) => match (items.first(), items.last()) {
            (Some(first), Some(last)) => mixed_fits(first) && mixed_fits(last),
            _ => true,
        },
        _ => true,
    }
}

pub(crate) fn value_repr(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format!("{x:?}"),
        Value::String(s) => {
            let flat = s.replace('\n', " ");
            let cut: String = flat.chars().take(100).collect();
            format!("'{cut}'")
        }
        Value::Array(arr) => format!("array({} items)", arr.len()),
        Value::Tuple(items) => format!("array({} items)", items.len()),
        Value::Instance(handle) => format!("instance of {}", handle.borrow().class().name()),
    }
}
