//! End-to-end tests for the JSON instance codec.
//!
//! Each test registers its own classes; the class and encoder
//! registries are shared by the whole test binary, so names are never
//! reused across tests.

use instar_core::{ArrayKey, ClassDef, ClassRegistry, FieldDef, Instance, VArray, Value};
use instar_json::{
    DEFAULT_ENCODER, JsonDecodeError, JsonEncoder, JsonFlags, RenamePolicy, from_json, to_json,
};

// =============================================================================
// Full graph round-trips
// =============================================================================

#[test]
fn nested_graph_round_trips_through_exact_text() {
    instar_testhelpers::setup();

    ClassDef::builder("jrt\\Address")
        .field(FieldDef::new("street").doc("/** @var string */"))
        .field(FieldDef::new("zip").doc("/** @var int */"))
        .register()
        .unwrap();
    ClassDef::builder("jrt\\User")
        .field(FieldDef::new("id").doc("/** @var int */"))
        .field(FieldDef::new("name").doc("/** @var string */"))
        .field(FieldDef::new("address").doc("/** @var ?Address */"))
        .field(FieldDef::new("tags").doc("/** @var string[] */"))
        .register()
        .unwrap();

    let registry = ClassRegistry::global();
    let address = Instance::instantiate_ref(&registry.get("jrt\\Address").unwrap()).unwrap();
    {
        let mut a = address.borrow_mut();
        a.set("street", Value::from("main")).unwrap();
        a.set("zip", Value::Int(99)).unwrap();
    }
    let user = Instance::instantiate_ref(&registry.get("jrt\\User").unwrap()).unwrap();
    {
        let mut u = user.borrow_mut();
        u.set("id", Value::Int(3)).unwrap();
        u.set("name", Value::from("ann")).unwrap();
        u.set("address", Value::Instance(address)).unwrap();
        u.set(
            "tags",
            Value::Array(VArray::from_values([Value::from("a"), Value::from("b")])),
        )
        .unwrap();
    }

    let json = to_json(&user, DEFAULT_ENCODER, &JsonFlags::default(), &VArray::new()).unwrap();
    assert_eq!(
        json,
        r#"{"id":3,"name":"ann","address":{"street":"main","zip":99},"tags":["a","b"]}"#
    );

    let back = from_json(&json, "jrt\\User", DEFAULT_ENCODER).unwrap();
    let u = back.borrow();
    assert_eq!(u.get("id"), Some(&Value::Int(3)));
    assert_eq!(u.get("name"), Some(&Value::from("ann")));
    assert_eq!(
        u.get("tags"),
        Some(&Value::Array(VArray::from_values([
            Value::from("a"),
            Value::from("b")
        ])))
    );
    let Some(Value::Instance(addr)) = u.get("address") else {
        panic!("address not decoded as an instance");
    };
    assert_eq!(addr.borrow().get("street"), Some(&Value::from("main")));
    assert_eq!(addr.borrow().get("zip"), Some(&Value::Int(99)));
}

#[test]
fn pretty_flag_indents_four_spaces() {
    ClassDef::builder("jrt\\Pretty")
        .field(FieldDef::new("a").doc("/** @var int */"))
        .field(FieldDef::new("xs").doc("/** @var int[] */"))
        .register()
        .unwrap();

    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Pretty").unwrap()).unwrap();
    {
        let mut o = obj.borrow_mut();
        o.set("a", Value::Int(1)).unwrap();
        o.set(
            "xs",
            Value::Array(VArray::from_values([Value::Int(2), Value::Int(3)])),
        )
        .unwrap();
    }

    let flags = JsonFlags {
        pretty: true,
        preserve_zero_fraction: false,
    };
    let json = to_json(&obj, DEFAULT_ENCODER, &flags, &VArray::new()).unwrap();
    assert_eq!(
        json,
        "{\n    \"a\": 1,\n    \"xs\": [\n        2,\n        3\n    ]\n}"
    );
}

#[test]
fn zero_fraction_flag_keeps_integral_floats() {
    ClassDef::builder("jrt\\Ratio")
        .field(FieldDef::new("r").doc("/** @var float */"))
        .register()
        .unwrap();

    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Ratio").unwrap()).unwrap();
    obj.borrow_mut().set("r", Value::Float(5.0)).unwrap();

    let plain = to_json(&obj, DEFAULT_ENCODER, &JsonFlags::default(), &VArray::new()).unwrap();
    assert_eq!(plain, r#"{"r":5}"#);

    let flags = JsonFlags {
        pretty: false,
        preserve_zero_fraction: true,
    };
    let kept = to_json(&obj, DEFAULT_ENCODER, &flags, &VArray::new()).unwrap();
    assert_eq!(kept, r#"{"r":5.0}"#);

    let back = from_json(&kept, "jrt\\Ratio", DEFAULT_ENCODER).unwrap();
    assert_eq!(back.borrow().get("r"), Some(&Value::Float(5.0)));
}

// =============================================================================
// Encoder profiles
// =============================================================================

#[test]
fn snake_case_profile_renames_both_directions() {
    JsonEncoder::builder("jrt\\ApiEncoder")
        .rename_policy(RenamePolicy::SnakeCase)
        .skip_if_default(true)
        .register()
        .unwrap();
    ClassDef::builder("jrt\\Profile")
        .field(FieldDef::new("userName").doc("/** @var string */"))
        .field(FieldDef::new("failedLogins").doc("/** @var int */").default(0))
        .register()
        .unwrap();

    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Profile").unwrap()).unwrap();
    obj.borrow_mut().set("userName", Value::from("ana")).unwrap();

    let json = to_json(&obj, "jrt\\ApiEncoder", &JsonFlags::default(), &VArray::new()).unwrap();
    assert_eq!(json, r#"{"user_name":"ana"}"#);

    let back = from_json(
        r#"{"user_name":"bob","failed_logins":2}"#,
        "jrt\\Profile",
        "jrt\\ApiEncoder",
    )
    .unwrap();
    let o = back.borrow();
    assert_eq!(o.get("userName"), Some(&Value::from("bob")));
    assert_eq!(o.get("failedLogins"), Some(&Value::Int(2)));

    // the default profile still reads the names as declared
    let back = from_json(r#"{"userName":"eve"}"#, "jrt\\Profile", DEFAULT_ENCODER).unwrap();
    assert_eq!(back.borrow().get("userName"), Some(&Value::from("eve")));
}

// =============================================================================
// Flatten classes and extra pairs
// =============================================================================

#[test]
fn flatten_wrapper_is_transparent_on_the_wire() {
    ClassDef::builder("jrt\\Counter")
        .doc("/** @kphp-json flatten */")
        .field(FieldDef::new("value").doc("/** @var int */"))
        .register()
        .unwrap();

    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Counter").unwrap()).unwrap();
    obj.borrow_mut().set("value", Value::Int(7)).unwrap();

    let json = to_json(&obj, DEFAULT_ENCODER, &JsonFlags::default(), &VArray::new()).unwrap();
    assert_eq!(json, "7");

    let back = from_json("7", "jrt\\Counter", DEFAULT_ENCODER).unwrap();
    assert_eq!(back.borrow().get("value"), Some(&Value::Int(7)));
}

#[test]
fn more_pairs_ride_along_without_decoding_back() {
    ClassDef::builder("jrt\\Msg")
        .field(FieldDef::new("id").doc("/** @var int */"))
        .register()
        .unwrap();

    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Msg").unwrap()).unwrap();
    obj.borrow_mut().set("id", Value::Int(3)).unwrap();

    let mut more = VArray::new();
    more.insert(ArrayKey::from("version"), Value::Int(2));
    let json = to_json(&obj, DEFAULT_ENCODER, &JsonFlags::default(), &more).unwrap();
    assert_eq!(json, r#"{"id":3,"version":2}"#);

    let back = from_json(&json, "jrt\\Msg", DEFAULT_ENCODER).unwrap();
    assert_eq!(back.borrow().get("id"), Some(&Value::Int(3)));
}

// =============================================================================
// Failure surfaces
// =============================================================================

#[test]
fn non_object_roots_and_garbage_are_rejected() {
    ClassDef::builder("jrt\\Root")
        .field(FieldDef::new("v").doc("/** @var ?int */"))
        .register()
        .unwrap();

    let err = from_json("[1,2]", "jrt\\Root", DEFAULT_ENCODER).unwrap_err();
    assert_eq!(
        err.to_string(),
        "root element of json string must be an object type, got array"
    );

    let err = from_json("null", "jrt\\Root", DEFAULT_ENCODER).unwrap_err();
    assert_eq!(
        err.to_string(),
        "root element of json string must be an object type, got NULL"
    );

    let err = from_json("{\"v\":", "jrt\\Root", DEFAULT_ENCODER).unwrap_err();
    assert!(matches!(err, JsonDecodeError::Malformed { .. }));
}

#[test]
fn unknown_encoders_are_reported_before_any_work() {
    ClassDef::builder("jrt\\Lone")
        .field(FieldDef::new("v").doc("/** @var ?int */"))
        .register()
        .unwrap();
    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Lone").unwrap()).unwrap();

    let err = to_json(&obj, "jrt\\NoSuchEncoder", &JsonFlags::default(), &VArray::new())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "json encoder jrt\\NoSuchEncoder is not registered"
    );

    // the profile resolves before the text is even parsed
    let err = from_json("not json at all", "jrt\\Lone", "jrt\\NoSuchEncoder").unwrap_err();
    assert_eq!(
        err.to_string(),
        "json encoder jrt\\NoSuchEncoder is not registered"
    );
}

#[test]
fn policy_mistakes_name_the_class_and_field() {
    instar_testhelpers::setup();

    ClassDef::builder("jrt\\Broken")
        .field(FieldDef::new("v").doc("/** @kphp-json skip=sideways\n * @var int */"))
        .register()
        .unwrap();
    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Broken").unwrap()).unwrap();

    let err = to_json(&obj, DEFAULT_ENCODER, &JsonFlags::default(), &VArray::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error at field jrt\\Broken::$v: @kphp-json 'skip' should be true|false|encode|decode, got 'sideways'"
    );
}

#[test]
fn type_mismatches_carry_their_full_path() {
    ClassDef::builder("jrt\\Item")
        .field(FieldDef::new("id").doc("/** @var int */"))
        .register()
        .unwrap();
    ClassDef::builder("jrt\\Cart")
        .field(FieldDef::new("items").doc("/** @var Item[] */"))
        .register()
        .unwrap();

    let err = from_json(
        r#"{"items":[{"id":1},{"id":"two"}]}"#,
        "jrt\\Cart",
        DEFAULT_ENCODER,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unexpected type string for key /['items'][.]['id']"
    );
}

#[test]
fn encoding_an_unset_non_nullable_field_fails_loudly() {
    instar_testhelpers::setup();

    ClassDef::builder("jrt\\Strict")
        .field(FieldDef::new("must").doc("/** @var int */"))
        .register()
        .unwrap();
    let obj =
        Instance::instantiate_ref(&ClassRegistry::global().get("jrt\\Strict").unwrap()).unwrap();

    let err = to_json(&obj, DEFAULT_ENCODER, &JsonFlags::default(), &VArray::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field jrt\\Strict::$must seems to be uninitialized"
    );
}
