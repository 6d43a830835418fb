//! Instance-to-MessagePack encoding.

use instar_core::{ArrayKey, Instance, Value};

use crate::error::MsgPackError;
use crate::metadata::instance_metadata;
use crate::verify::{field_error, verify_value};
use crate::writer::MsgPackWriter;

/// Maximum nesting of instances inside one another.
pub(crate) const MAX_INSTANCE_DEPTH: usize = 20;

/// Encodes one instance as a flat array of alternating tags and values.
pub(crate) fn write_instance(
    w: &mut MsgPackWriter,
    obj: &Instance,
    depth: usize,
) -> Result<(), MsgPackError> {
    if depth + 1 > MAX_INSTANCE_DEPTH {
        return Err(MsgPackError::RecursionLimit);
    }
    let meta = instance_metadata(obj.class().name())?;

    w.write_array_header(meta.fields().len() * 2);
    let null = Value::Null;
    for field in meta.fields() {
        let value = obj.get(field.name()).unwrap_or(&null);
        verify_value(field.type_expr(), value, depth + 1)
            .map_err(|err| field_error(meta.class_name(), field.name(), err))?;
        w.write_i64(i64::from(field.id()));
        write_value(w, value, field.as_float32(), depth + 1)?;
    }
    Ok(())
}

/// Writes a verified field value. `force_f32` narrows floats to single
/// precision, recursively through arrays and tuples but not into nested
/// instances, which apply their own per-field markers.
fn write_value(
    w: &mut MsgPackWriter,
    value: &Value,
    force_f32: bool,
    depth: usize,
) -> Result<(), MsgPackError> {
    match value {
        Value::Null => w.write_nil(),
        Value::Bool(b) => w.write_bool(*b),
        Value::Int(i) => w.write_i64(*i),
        Value::Float(x) => {
            if force_f32 {
                w.write_f32(*x as f32);
            } else {
                w.write_f64(*x);
            }
        }
        Value::String(s) => w.write_str(s),
        Value::Tuple(items) => {
            w.write_array_header(items.len());
            for item in items {
                write_value(w, item, force_f32, depth)?;
            }
        }
        Value::Array(arr) => {
            if arr.is_list() {
                w.write_array_header(arr.len());
                for item in arr.values() {
                    write_value(w, item, force_f32, depth)?;
                }
            } else {
                w.write_map_header(arr.len());
                for (key, item) in arr.iter() {
                    match key {
                        ArrayKey::Int(i) => w.write_i64(*i),
                        ArrayKey::Str(s) => w.write_str(s),
                    }
                    write_value(w, item, force_f32, depth)?;
                }
            }
        }
        Value::Instance(handle) => {
            let nested = handle.borrow();
            write_instance(w, &nested, depth)?;
        }
    }
    Ok(())
}

/// Writes a bare value, for the generic non-instance codec. Objects are
/// not packable here.
pub(crate) fn write_plain(w: &mut MsgPackWriter, value: &Value) -> Result<(), MsgPackError> {
    match value {
        Value::Null => w.write_nil(),
        Value::Bool(b) => w.write_bool(*b),
        Value::Int(i) => w.write_i64(*i),
        Value::Float(x) => w.write_f64(*x),
        Value::String(s) => w.write_str(s),
        Value::Tuple(items) => {
            w.write_array_header(items.len());
            for item in items {
                write_plain(w, item)?;
            }
        }
        Value::Array(arr) => {
            if arr.is_list() {
                w.write_array_header(arr.len());
                for item in arr.values() {
                    write_plain(w, item)?;
                }
            } else {
                w.write_map_header(arr.len());
                for (key, item) in arr.iter() {
                    match key {
                        ArrayKey::Int(i) => w.write_i64(*i),
                        ArrayKey::Str(s) => w.write_str(s),
                    }
                    write_plain(w, item)?;
                }
            }
        }
        Value::Instance(_) => {
            return Err(MsgPackError::UnsupportedValue {
                type_name: value.type_name().to_string(),
            });
        }
    }
    Ok(())
}
