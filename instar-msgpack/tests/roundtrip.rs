//! End-to-end tests for the binary instance codec.
//!
//! Each test registers its own classes; the registry is shared by the
//! whole test binary, so names are never reused across tests.

use instar_core::{ClassDef, ClassRegistry, FieldDef, Instance, VArray, Value};
use instar_msgpack::{
    MsgPackError, MsgPackWriter, UnpackError, instance_deserialize, instance_deserialize_safe,
    instance_serialize, instance_serialize_safe, pack_value, unpack_value,
};

// =============================================================================
// Full graph round-trips
// =============================================================================

#[test]
fn nested_graph_round_trips_through_exact_bytes() {
    instar_testhelpers::setup();

    ClassDef::builder("rt\\Address")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("street").doc("/** @kphp-serialized-field 1\n * @var string */"))
        .field(FieldDef::new("zip").doc("/** @kphp-serialized-field 2\n * @var int */"))
        .register()
        .unwrap();
    ClassDef::builder("rt\\User")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("id").doc("/** @kphp-serialized-field 0\n * @var int */"))
        .field(FieldDef::new("name").doc("/** @kphp-serialized-field 1\n * @var string */"))
        .field(FieldDef::new("address").doc("/** @kphp-serialized-field 2\n * @var ?Address */"))
        .field(FieldDef::new("scores").doc("/** @kphp-serialized-field 3\n * @var int[] */"))
        .field(
            FieldDef::new("pair").doc("/** @kphp-serialized-field 4\n * @var tuple(int, string) */"),
        )
        .register()
        .unwrap();

    let registry = ClassRegistry::global();
    let address = Instance::instantiate_ref(&registry.get("rt\\Address").unwrap()).unwrap();
    {
        let mut a = address.borrow_mut();
        a.set("street", Value::from("main")).unwrap();
        a.set("zip", Value::Int(99)).unwrap();
    }
    let user = Instance::instantiate_ref(&registry.get("rt\\User").unwrap()).unwrap();
    {
        let mut u = user.borrow_mut();
        u.set("id", Value::Int(3)).unwrap();
        u.set("name", Value::from("ann")).unwrap();
        u.set("address", Value::Instance(address)).unwrap();
        u.set(
            "scores",
            Value::Array(VArray::from_values([Value::Int(10), Value::Int(20)])),
        )
        .unwrap();
        u.set("pair", Value::Tuple(vec![Value::Int(7), Value::from("ok")]))
            .unwrap();
    }

    let bytes = instance_serialize_safe(&user).unwrap();
    assert_eq!(
        bytes,
        [
            0x9a, 0x00, 0x03, 0x01, 0xa3, b'a', b'n', b'n', 0x02, 0x94, 0x01, 0xa4, b'm', b'a',
            b'i', b'n', 0x02, 0x63, 0x03, 0x92, 0x0a, 0x14, 0x04, 0x92, 0x07, 0xa2, b'o', b'k'
        ]
    );

    let back = instance_deserialize_safe(&bytes, "rt\\User").unwrap().unwrap();
    let u = back.borrow();
    assert_eq!(u.get("id"), Some(&Value::Int(3)));
    assert_eq!(u.get("name"), Some(&Value::from("ann")));
    assert_eq!(
        u.get("scores"),
        Some(&Value::Array(VArray::from_values([
            Value::Int(10),
            Value::Int(20)
        ])))
    );
    assert_eq!(
        u.get("pair"),
        Some(&Value::Tuple(vec![Value::Int(7), Value::from("ok")]))
    );
    let Some(Value::Instance(addr)) = u.get("address") else {
        panic!("address not decoded as an instance");
    };
    assert_eq!(addr.borrow().get("street"), Some(&Value::from("main")));
    assert_eq!(addr.borrow().get("zip"), Some(&Value::Int(99)));
}

#[test]
fn null_instance_field_round_trips_as_nil() {
    ClassDef::builder("rt\\Pocket")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("coin").doc("/** @kphp-serialized-field 0\n * @var ?int */"))
        .register()
        .unwrap();

    let obj = Instance::instantiate_ref(&ClassRegistry::global().get("rt\\Pocket").unwrap())
        .unwrap();
    let bytes = instance_serialize_safe(&obj).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0xc0]);

    let back = instance_deserialize_safe(&bytes, "rt\\Pocket").unwrap().unwrap();
    assert_eq!(back.borrow().get("coin"), Some(&Value::Null));
}

#[test]
fn union_fields_keep_whichever_arm_the_value_took() {
    ClassDef::builder("rt\\Either")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("v").doc("/** @kphp-serialized-field 0\n * @var int|string */"))
        .register()
        .unwrap();

    let class = ClassRegistry::global().get("rt\\Either").unwrap();
    let as_int = Instance::instantiate_ref(&class).unwrap();
    as_int.borrow_mut().set("v", Value::Int(5)).unwrap();
    let bytes = instance_serialize_safe(&as_int).unwrap();
    let back = instance_deserialize_safe(&bytes, "rt\\Either").unwrap().unwrap();
    assert_eq!(back.borrow().get("v"), Some(&Value::Int(5)));

    let as_str = Instance::instantiate_ref(&class).unwrap();
    as_str.borrow_mut().set("v", Value::from("5")).unwrap();
    let bytes = instance_serialize_safe(&as_str).unwrap();
    let back = instance_deserialize_safe(&bytes, "rt\\Either").unwrap().unwrap();
    assert_eq!(back.borrow().get("v"), Some(&Value::from("5")));
}

#[test]
fn float32_fields_come_back_as_doubles() {
    ClassDef::builder("rt\\Reading")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("r").doc(
            "/** @kphp-serialized-field 0\n * @kphp-serialized-float32\n * @var float */",
        ))
        .register()
        .unwrap();

    let obj = Instance::instantiate_ref(&ClassRegistry::global().get("rt\\Reading").unwrap())
        .unwrap();
    obj.borrow_mut().set("r", Value::Float(1.5)).unwrap();

    let bytes = instance_serialize_safe(&obj).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0xca, 0x3f, 0xc0, 0x00, 0x00]);

    let back = instance_deserialize_safe(&bytes, "rt\\Reading").unwrap().unwrap();
    assert_eq!(back.borrow().get("r"), Some(&Value::Float(1.5)));
}

// =============================================================================
// Cross-version payloads
// =============================================================================

#[test]
fn tags_from_newer_writers_are_ignored() {
    ClassDef::builder("rt\\Old")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("v").doc("/** @kphp-serialized-field 1\n * @var int */"))
        .register()
        .unwrap();

    let mut w = MsgPackWriter::new();
    w.write_array_header(4);
    w.write_i64(9);
    w.write_str("added in a future version");
    w.write_i64(1);
    w.write_i64(42);

    let back = instance_deserialize_safe(&w.into_bytes(), "rt\\Old")
        .unwrap()
        .unwrap();
    assert_eq!(back.borrow().get("v"), Some(&Value::Int(42)));
}

#[test]
fn bin_encoded_strings_are_accepted() {
    ClassDef::builder("rt\\Tagged")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("s").doc("/** @kphp-serialized-field 0\n * @var string */"))
        .register()
        .unwrap();

    let bytes = [0x92, 0x00, 0xc4, 0x02, b'h', b'i'];
    let back = instance_deserialize_safe(&bytes, "rt\\Tagged").unwrap().unwrap();
    assert_eq!(back.borrow().get("s"), Some(&Value::from("hi")));
}

// =============================================================================
// Failure behavior of the two entry-point flavors
// =============================================================================

#[test]
fn tolerant_serialize_swallows_policy_errors() {
    instar_testhelpers::setup();

    ClassDef::builder("rt\\Bare").register().unwrap();
    let obj = Instance::instantiate_ref(&ClassRegistry::global().get("rt\\Bare").unwrap())
        .unwrap();

    assert_eq!(instance_serialize(&obj), None);
    let err = instance_serialize_safe(&obj).unwrap_err();
    assert_eq!(err.to_string(), "add @kphp-serializable phpdoc to class: rt\\Bare");
}

#[test]
fn tolerant_serialize_swallows_recursion_errors() {
    instar_testhelpers::setup();

    ClassDef::builder("rt\\Cyc")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("next").doc("/** @kphp-serialized-field 0\n * @var ?Cyc */"))
        .register()
        .unwrap();

    let node = Instance::instantiate_ref(&ClassRegistry::global().get("rt\\Cyc").unwrap())
        .unwrap();
    node.borrow_mut()
        .set("next", Value::Instance(std::rc::Rc::clone(&node)))
        .unwrap();

    assert_eq!(
        instance_serialize_safe(&node).unwrap_err(),
        MsgPackError::RecursionLimit
    );
    assert_eq!(instance_serialize(&node), None);
}

#[test]
fn tolerant_deserialize_flattens_nil_and_errors() {
    instar_testhelpers::setup();

    ClassDef::builder("rt\\Maybe")
        .doc("/** @kphp-serializable */")
        .register()
        .unwrap();

    assert!(instance_deserialize_safe(&[0xc0], "rt\\Maybe").unwrap().is_none());
    assert!(instance_deserialize(&[0xc0], "rt\\Maybe").is_none());
    assert!(instance_deserialize(&[0xc1], "rt\\Maybe").is_none());
}

#[test]
fn trailing_bytes_are_reported_with_offsets() {
    ClassDef::builder("rt\\Short")
        .doc("/** @kphp-serializable */")
        .register()
        .unwrap();

    let err = instance_deserialize_safe(&[0xc0, 0x01], "rt\\Short").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Consumed only first 1 characters of 2 during deserialization"
    );
    assert_eq!(
        err,
        MsgPackError::Unpack(UnpackError::TrailingBytes { consumed: 1, total: 2 })
    );
}

#[test]
fn non_sequence_payloads_are_rejected() {
    ClassDef::builder("rt\\Seq")
        .doc("/** @kphp-serializable */")
        .field(FieldDef::new("v").doc("/** @kphp-serialized-field 0\n * @var int */"))
        .register()
        .unwrap();

    let err = instance_deserialize_safe(&[0x2a], "rt\\Seq").unwrap_err();
    assert_eq!(err, MsgPackError::TopLevelNotSequence);
    assert_eq!(
        err.to_string(),
        "expected msgpack array of field tags and values"
    );
}

// =============================================================================
// Generic value packing
// =============================================================================

#[test]
fn plain_values_round_trip() {
    let mut map = VArray::new();
    map.insert(instar_core::ArrayKey::from("name"), Value::from("x"));
    map.insert(instar_core::ArrayKey::Int(5), Value::Bool(true));
    let value = Value::Array(VArray::from_values([
        Value::Null,
        Value::Int(-129),
        Value::Float(0.25),
        Value::Array(map),
    ]));

    let bytes = pack_value(&value).unwrap();
    assert_eq!(unpack_value(&bytes).unwrap(), value);
}

#[test]
fn plain_packing_rejects_instances() {
    ClassDef::builder("rt\\Boxed")
        .doc("/** @kphp-serializable */")
        .register()
        .unwrap();
    let obj = Instance::instantiate_ref(&ClassRegistry::global().get("rt\\Boxed").unwrap())
        .unwrap();

    let err = pack_value(&Value::Instance(obj)).unwrap_err();
    assert_eq!(err.to_string(), "cannot pack value of type object");
}
