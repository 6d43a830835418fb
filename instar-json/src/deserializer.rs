//! JSON-to-instance decoding.

use instar_core::{ArrayKey, Instance, InstanceRef, VArray, Value};
use instar_phpdoc::{Primitive, TypeExpr};

use crate::error::JsonDecodeError;
use crate::metadata::{ClassPolicy, FieldPolicy, class_policy};
use crate::path::JsonPath;

/// Rebuilds an instance of `class_name` from a decoded JSON subtree.
///
/// The policy is resolved before anything else, so a misconfigured
/// class is reported even for a null subtree. For regular classes null
/// decodes to `Ok(None)` and anything but an object is an error; a
/// flatten class consumes the subtree as its single field's value.
/// Keys with no matching field are ignored.
pub(crate) fn decode_instance(
    class_name: &str,
    v: &serde_json::Value,
    path: &mut JsonPath,
    encoder_name: &str,
) -> Result<Option<InstanceRef>, JsonDecodeError> {
    let policy = class_policy(class_name, encoder_name)?;

    if policy.flatten() {
        let instance = Instance::instantiate_ref(policy.class())?;
        let field = &policy.fields()[0];
        let value = decode_field_value(field, v, path, encoder_name)?;
        instance.borrow_mut().set(field.name(), value)?;
        run_wakeup(&policy, &instance)?;
        return Ok(Some(instance));
    }

    if v.is_null() {
        return Ok(None);
    }
    let Some(map) = v.as_object() else {
        return Err(unexpected(v, path));
    };

    let instance = Instance::instantiate_ref(policy.class())?;
    // own fields are filled first, then the chain up to the root
    let mut level = Some(&policy);
    while let Some(p) = level {
        decode_level_fields(p, map, &instance, path, encoder_name)?;
        level = p.parent();
    }
    run_wakeup(&policy, &instance)?;
    Ok(Some(instance))
}

fn decode_level_fields(
    policy: &ClassPolicy,
    map: &serde_json::Map<String, serde_json::Value>,
    instance: &InstanceRef,
    path: &mut JsonPath,
    encoder_name: &str,
) -> Result<(), JsonDecodeError> {
    for field in policy.fields() {
        if field.skip_when_decoding() {
            continue;
        }
        match map.get(field.json_key()) {
            None => {
                if field.required() {
                    return Err(JsonDecodeError::AbsentRequiredField {
                        key: field.json_key().to_string(),
                        path: path.to_string(),
                    });
                }
                // declared defaults are in place from instantiation; a
                // nullable field without one becomes an explicit null
                if field.default_value().is_none() && field.nullable() {
                    instance.borrow_mut().set(field.name(), Value::Null)?;
                }
            }
            Some(sub) => {
                path.enter(Some(field.json_key()));
                let value = decode_field_value(field, sub, path, encoder_name)?;
                instance.borrow_mut().set(field.name(), value)?;
                path.leave();
            }
        }
    }
    Ok(())
}

/// A raw field swallows its subtree back into compact JSON text;
/// everything else converts through the declared type.
fn decode_field_value(
    field: &FieldPolicy,
    v: &serde_json::Value,
    path: &mut JsonPath,
    encoder_name: &str,
) -> Result<Value, JsonDecodeError> {
    if field.raw_string() {
        return Ok(Value::String(serde_json::to_string(v)?));
    }
    convert(field.type_expr(), v, path, encoder_name)
}

fn convert(
    expr: &TypeExpr,
    v: &serde_json::Value,
    path: &mut JsonPath,
    encoder_name: &str,
) -> Result<Value, JsonDecodeError> {
    match expr {
        TypeExpr::Primitive(p) => convert_primitive(*p, v, path),
        TypeExpr::Instance(class) => {
            // no object precheck: a flatten target takes any subtree
            Ok(match decode_instance(class, v, path, encoder_name)? {
                Some(obj) => Value::Instance(obj),
                None => Value::Null,
            })
        }
        TypeExpr::Array(inner) => {
            let mut out = VArray::new();
            match v {
                serde_json::Value::Array(items) => {
                    path.enter(None);
                    for item in items {
                        out.push(convert(inner, item, path, encoder_name)?);
                    }
                    path.leave();
                }
                serde_json::Value::Object(entries) => {
                    path.enter(None);
                    for (key, item) in entries {
                        out.insert(
                            ArrayKey::from_string(key.as_str()),
                            convert(inner, item, path, encoder_name)?,
                        );
                    }
                    path.leave();
                }
                other => return Err(unexpected(other, path)),
            }
            Ok(Value::Array(out))
        }
        TypeExpr::Tuple(_) => Err(JsonDecodeError::TupleUnsupported {
            path: path.to_string(),
        }),
        TypeExpr::Or(a, b) => {
            let mark = path.depth();
            convert(a, v, path, encoder_name).or_else(|_| {
                path.rewind(mark);
                convert(b, v, path, encoder_name)
            })
        }
    }
}

fn convert_primitive(
    p: Primitive,
    v: &serde_json::Value,
    path: &mut JsonPath,
) -> Result<Value, JsonDecodeError> {
    let converted = match p {
        Primitive::Int => v.as_i64().map(Value::Int),
        Primitive::Float => v.as_f64().map(Value::Float),
        Primitive::Str => v.as_str().map(Value::from),
        Primitive::Bool => v.as_bool().map(Value::Bool),
        Primitive::False => match v.as_bool() {
            Some(false) => Some(Value::Bool(false)),
            _ => None,
        },
        Primitive::True => match v.as_bool() {
            Some(true) => Some(Value::Bool(true)),
            _ => None,
        },
        Primitive::Null => v.is_null().then_some(Value::Null),
        // mixed rejects only class instances, and a decoded json tree
        // cannot contain one
        Primitive::Mixed | Primitive::Any => Some(convert_any(v)),
    };
    converted.ok_or_else(|| unexpected(v, path))
}

/// Deep conversion with no type to steer it: objects and arrays both
/// land in [`VArray`], numbers split on integrality.
fn convert_any(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let mut arr = VArray::new();
            for item in items {
                arr.push(convert_any(item));
            }
            Value::Array(arr)
        }
        serde_json::Value::Object(entries) => {
            let mut arr = VArray::new();
            for (key, item) in entries {
                arr.insert(ArrayKey::from_string(key.as_str()), convert_any(item));
            }
            Value::Array(arr)
        }
    }
}

fn run_wakeup(policy: &ClassPolicy, instance: &InstanceRef) -> Result<(), JsonDecodeError> {
    if let Some(hook) = policy.class().wakeup_in_chain()? {
        hook(&mut instance.borrow_mut());
    }
    Ok(())
}

fn unexpected(v: &serde_json::Value, path: &JsonPath) -> JsonDecodeError {
    JsonDecodeError::UnexpectedType {
        type_name: json_type_name(v).to_string(),
        path: path.to_string(),
    }
}

/// PHP `gettype` names for decoded JSON values, as error messages
/// spell them.
pub(crate) fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "NULL",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) => {
            if n.is_i64() {
                "integer"
            } else {
                "double"
            }
        }
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
