//! Instance-to-JSON encoding.

use instar_core::{Instance, VArray, Value};
use tracing::warn;

use crate::error::JsonEncodeError;
use crate::metadata::{ClassPolicy, FieldPolicy, class_policy};
use crate::writer::JsonWriter;

/// Maximum nesting of encoded objects inside one another.
pub(crate) const MAX_JSON_DEPTH: usize = 64;

/// Encodes one instance under the runtime class's policy. `more`
/// appends extra key-value pairs to the top-level object and is never
/// forwarded to nested instances.
pub(crate) fn encode_instance(
    w: &mut JsonWriter,
    obj: &Instance,
    encoder_name: &str,
    depth: usize,
    more: Option<&VArray>,
) -> Result<(), JsonEncodeError> {
    let policy = class_policy(obj.class().name(), encoder_name)?;

    // a flatten class is its single field's bare value, with no object
    // around it and no depth cost
    if policy.flatten() {
        let field = &policy.fields()[0];
        let Some(value) = obj.get(field.name()) else {
            return Err(uninitialized(&policy, field));
        };
        return encode_field_value(
            w,
            value,
            field.float_precision(),
            field.array_as_hashmap(),
            field.raw_string(),
            encoder_name,
            depth,
        );
    }

    if depth + 1 > MAX_JSON_DEPTH {
        return Err(JsonEncodeError::DepthLimit);
    }
    w.start_object()?;
    encode_class_fields(w, &policy, obj, encoder_name, depth + 1)?;
    if let Some(extra) = more {
        for (key, value) in extra.iter() {
            w.write_key(&key.as_display_string(), false)?;
            encode_field_value(w, value, 0, false, false, encoder_name, depth + 1)?;
        }
    }
    w.end_object()
}

/// Walks the chain so that parent fields appear first, each level under
/// its own declaring class's policy and output order.
fn encode_class_fields(
    w: &mut JsonWriter,
    policy: &ClassPolicy,
    obj: &Instance,
    encoder_name: &str,
    depth: usize,
) -> Result<(), JsonEncodeError> {
    if let Some(parent) = policy.parent() {
        encode_class_fields(w, parent, obj, encoder_name, depth)?;
    }
    for field in policy.encode_fields() {
        encode_field(w, policy, field, obj, encoder_name, depth)?;
    }
    Ok(())
}

fn encode_field(
    w: &mut JsonWriter,
    policy: &ClassPolicy,
    field: &FieldPolicy,
    obj: &Instance,
    encoder_name: &str,
    depth: usize,
) -> Result<(), JsonEncodeError> {
    if field.skip_when_encoding() {
        return Ok(());
    }

    let stored = obj.get(field.name());
    let null = Value::Null;
    let value = stored.unwrap_or(&null);
    if matches!(value, Value::Null) && !field.nullable() {
        let err = uninitialized(policy, field);
        warn!("{err}");
        return Err(err);
    }

    if field.skip_if_default() && matches_default(stored, field) {
        return Ok(());
    }

    w.write_key(field.json_key(), false)?;
    encode_field_value(
        w,
        value,
        field.float_precision(),
        field.array_as_hashmap(),
        field.raw_string(),
        encoder_name,
        depth,
    )
}

/// An uninitialized property compares equal to null, not to its
/// declared default.
fn matches_default(stored: Option<&Value>, field: &FieldPolicy) -> bool {
    match stored {
        None => true,
        Some(value) => match field.default_value() {
            Some(default) => default.matches(value),
            None => matches!(value, Value::Null),
        },
    }
}

fn encode_field_value(
    w: &mut JsonWriter,
    value: &Value,
    float_precision: u32,
    array_as_hashmap: bool,
    raw_string: bool,
    encoder_name: &str,
    depth: usize,
) -> Result<(), JsonEncodeError> {
    if raw_string {
        if let Value::String(s) = value {
            return w.write_raw_string(s);
        }
        // a nullable raw field holding null still has to produce json
        return write_any_value(w, value, array_as_hashmap, encoder_name, depth);
    }
    if float_precision != 0 {
        w.set_float_precision(float_precision);
    }
    write_any_value(w, value, array_as_hashmap, encoder_name, depth)?;
    if float_precision != 0 {
        w.restore_float_precision();
    }
    Ok(())
}

fn write_any_value(
    w: &mut JsonWriter,
    value: &Value,
    array_as_hashmap: bool,
    encoder_name: &str,
    depth: usize,
) -> Result<(), JsonEncodeError> {
    match value {
        Value::Null => w.write_null(),
        Value::Bool(b) => w.write_bool(*b),
        Value::Int(i) => w.write_int(*i),
        Value::Float(x) => w.write_double(*x),
        Value::String(s) => w.write_string(s),
        Value::Array(arr) => {
            if !array_as_hashmap && arr.is_vector_or_pseudo_vector() {
                w.start_array()?;
                for item in arr.values() {
                    write_any_value(w, item, false, encoder_name, depth)?;
                }
                w.end_array()
            } else {
                w.start_object()?;
                for (key, item) in arr.iter() {
                    w.write_key(&key.as_display_string(), true)?;
                    write_any_value(w, item, false, encoder_name, depth)?;
                }
                w.end_object()
            }
        }
        Value::Instance(handle) => {
            let nested = handle.borrow();
            encode_instance(w, &nested, encoder_name, depth, None)
        }
        Value::Tuple(_) => Err(JsonEncodeError::TupleUnsupported),
    }
}

fn uninitialized(policy: &ClassPolicy, field: &FieldPolicy) -> JsonEncodeError {
    JsonEncodeError::UninitializedField {
        class: policy.class_name().to_string(),
        field: field.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use instar_core::{ArrayKey, ClassDef, FieldDef, Instance, VArray, Value};

    use super::*;
    use crate::encoder::DEFAULT_ENCODER;

    fn encode(obj: &Instance) -> Result<String, JsonEncodeError> {
        let mut w = JsonWriter::new(false, false);
        encode_instance(&mut w, obj, DEFAULT_ENCODER, 0, None)?;
        Ok(w.into_json())
    }

    #[test]
    fn fields_come_out_in_declaration_order() {
        let class = ClassDef::builder("jser\\Point")
            .field(FieldDef::new("x").doc("/** @var int */"))
            .field(FieldDef::new("y").doc("/** @var int */"))
            .field(FieldDef::new("label").doc("/** @var ?string */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("x", Value::Int(1)).unwrap();
        obj.set("y", Value::Int(2)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"x":1,"y":2,"label":null}"#);
    }

    #[test]
    fn parent_fields_come_out_first() {
        ClassDef::builder("jser\\Entity")
            .field(FieldDef::new("id").doc("/** @var int */"))
            .register()
            .unwrap();
        let user = ClassDef::builder("jser\\User")
            .parent("jser\\Entity")
            .field(FieldDef::new("name").doc("/** @var string */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&user).unwrap();
        obj.set("id", Value::Int(7)).unwrap();
        obj.set("name", Value::from("ana")).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"id":7,"name":"ana"}"#);
    }

    #[test]
    fn fields_directive_reorders_the_output() {
        let class = ClassDef::builder("jser\\Swapped")
            .doc("/** @kphp-json fields=$b, $a */")
            .field(FieldDef::new("a").doc("/** @var int */"))
            .field(FieldDef::new("b").doc("/** @var int */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("a", Value::Int(1)).unwrap();
        obj.set("b", Value::Int(2)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn skip_if_default_drops_matching_values() {
        let class = ClassDef::builder("jser\\Sparse")
            .doc("/** @kphp-json skip_if_default */")
            .field(FieldDef::new("id").doc("/** @var int */"))
            .field(FieldDef::new("cnt").doc("/** @var int */").default(0))
            .field(FieldDef::new("tag").doc("/** @var ?string */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("id", Value::Int(3)).unwrap();

        // cnt holds its default, tag is uninitialized
        assert_eq!(encode(&obj).unwrap(), r#"{"id":3}"#);

        obj.set("cnt", Value::Int(5)).unwrap();
        assert_eq!(encode(&obj).unwrap(), r#"{"id":3,"cnt":5}"#);
    }

    #[test]
    fn uninitialized_non_nullable_field_is_an_error() {
        let class = ClassDef::builder("jser\\Strict")
            .field(FieldDef::new("must").doc("/** @var int */"))
            .register()
            .unwrap();
        let obj = Instance::instantiate(&class).unwrap();
        let err = encode(&obj).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field jser\\Strict::$must seems to be uninitialized"
        );

        // an explicit null in a non-nullable field reads the same way
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("must", Value::Null).unwrap();
        assert_eq!(
            encode(&obj).unwrap_err().to_string(),
            "field jser\\Strict::$must seems to be uninitialized"
        );
    }

    #[test]
    fn arrays_pick_vector_or_object_shape() {
        let class = ClassDef::builder("jser\\Holder")
            .field(FieldDef::new("v").doc("/** @var int[] */"))
            .field(
                FieldDef::new("h").doc("/** @kphp-json array_as_hashmap\n * @var int[] */"),
            )
            .field(FieldDef::new("k").doc("/** @var string[] */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set(
            "v",
            Value::Array(VArray::from_values([Value::Int(1), Value::Int(2)])),
        )
        .unwrap();
        obj.set("h", Value::Array(VArray::from_values([Value::Int(5)])))
            .unwrap();
        let mut keyed = VArray::new();
        keyed.insert(ArrayKey::from("a"), Value::from("x"));
        obj.set("k", Value::Array(keyed)).unwrap();

        assert_eq!(
            encode(&obj).unwrap(),
            r#"{"v":[1,2],"h":{"0":5},"k":{"a":"x"}}"#
        );
    }

    #[test]
    fn holes_turn_a_vector_into_an_object() {
        let class = ClassDef::builder("jser\\Holey")
            .field(FieldDef::new("xs").doc("/** @var string[] */"))
            .register()
            .unwrap();
        let mut arr = VArray::new();
        arr.insert(ArrayKey::Int(0), Value::from("a"));
        arr.insert(ArrayKey::Int(2), Value::from("b"));
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("xs", Value::Array(arr)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"xs":{"0":"a","2":"b"}}"#);
    }

    #[test]
    fn nested_instances_follow_their_runtime_class() {
        ClassDef::builder("jser\\Shape")
            .field(FieldDef::new("kind").doc("/** @var string */"))
            .register()
            .unwrap();
        let circle = ClassDef::builder("jser\\Circle")
            .parent("jser\\Shape")
            .field(FieldDef::new("r").doc("/** @var int */"))
            .register()
            .unwrap();
        let canvas = ClassDef::builder("jser\\Canvas")
            .field(FieldDef::new("main").doc("/** @var ?Shape */"))
            .register()
            .unwrap();

        let inner = Instance::instantiate_ref(&circle).unwrap();
        inner.borrow_mut().set("kind", Value::from("c")).unwrap();
        inner.borrow_mut().set("r", Value::Int(3)).unwrap();
        let mut obj = Instance::instantiate(&canvas).unwrap();
        obj.set("main", Value::Instance(inner)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"main":{"kind":"c","r":3}}"#);
    }

    #[test]
    fn flatten_class_is_its_bare_field_value() {
        let wrapped = ClassDef::builder("jser\\Wrapped")
            .doc("/** @kphp-json flatten */")
            .field(FieldDef::new("value").doc("/** @var int */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&wrapped).unwrap();
        obj.set("value", Value::Int(7)).unwrap();
        assert_eq!(encode(&obj).unwrap(), "7");

        let boxed = ClassDef::builder("jser\\Box")
            .field(FieldDef::new("w").doc("/** @var ?Wrapped */"))
            .register()
            .unwrap();
        let inner = Instance::instantiate_ref(&wrapped).unwrap();
        inner.borrow_mut().set("value", Value::Int(9)).unwrap();
        let mut outer = Instance::instantiate(&boxed).unwrap();
        outer.set("w", Value::Instance(inner)).unwrap();
        assert_eq!(encode(&outer).unwrap(), r#"{"w":9}"#);
    }

    #[test]
    fn uninitialized_flatten_field_is_an_error() {
        let class = ClassDef::builder("jser\\FlatEmpty")
            .doc("/** @kphp-json flatten */")
            .field(FieldDef::new("value").doc("/** @var int */"))
            .register()
            .unwrap();
        let obj = Instance::instantiate(&class).unwrap();
        assert_eq!(
            encode(&obj).unwrap_err().to_string(),
            "field jser\\FlatEmpty::$value seems to be uninitialized"
        );
    }

    #[test]
    fn raw_string_embeds_preencoded_fragments() {
        let class = ClassDef::builder("jser\\Rawr")
            .field(
                FieldDef::new("payload").doc("/** @kphp-json raw_string\n * @var string */"),
            )
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("payload", Value::from(r#"{"a":1}"#)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"payload":{"a":1}}"#);
    }

    #[test]
    fn float_precision_scopes_to_the_field_subtree() {
        let class = ClassDef::builder("jser\\Rounded")
            .field(
                FieldDef::new("pi").doc("/** @kphp-json float_precision=2\n * @var float */"),
            )
            .field(FieldDef::new("e").doc("/** @var float */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("pi", Value::Float(3.14159)).unwrap();
        obj.set("e", Value::Float(2.71828)).unwrap();

        assert_eq!(encode(&obj).unwrap(), r#"{"pi":3.14,"e":2.71828}"#);
    }

    #[test]
    fn more_pairs_append_to_the_top_level_object() {
        let class = ClassDef::builder("jser\\WithMore")
            .field(FieldDef::new("id").doc("/** @var int */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("id", Value::Int(3)).unwrap();
        let mut more = VArray::new();
        more.insert(ArrayKey::from("extra"), Value::Int(1));
        more.insert(ArrayKey::from("note"), Value::from("hi"));

        let mut w = JsonWriter::new(false, false);
        encode_instance(&mut w, &obj, DEFAULT_ENCODER, 0, Some(&more)).unwrap();
        assert_eq!(w.into_json(), r#"{"id":3,"extra":1,"note":"hi"}"#);
    }

    #[test]
    fn cyclic_graphs_hit_the_depth_limit() {
        let class = ClassDef::builder("jser\\Node")
            .field(FieldDef::new("next").doc("/** @var ?Node */"))
            .register()
            .unwrap();
        let node = Instance::instantiate_ref(&class).unwrap();
        node.borrow_mut()
            .set("next", Value::Instance(std::rc::Rc::clone(&node)))
            .unwrap();

        let obj = node.borrow();
        let err = encode(&obj).unwrap_err();
        assert_eq!(err.to_string(), "allowed depth=64 of json object exceeded");
    }

    #[test]
    fn tuples_are_rejected() {
        let class = ClassDef::builder("jser\\Tupled")
            .field(FieldDef::new("t").doc("/** @var mixed */"))
            .register()
            .unwrap();
        let mut obj = Instance::instantiate(&class).unwrap();
        obj.set("t", Value::Tuple(vec![Value::Int(1), Value::from("x")]))
            .unwrap();

        assert_eq!(
            encode(&obj).unwrap_err().to_string(),
            "tuples are not supported in json"
        );
    }
}
