use std::rc::Rc;

use crate::{ArrayKey, InstanceRef, VArray};

/// A host-runtime value.
///
/// This is the dynamic model both codecs walk: scalars, PHP arrays,
/// class instances and (binary-only on the wire) tuples.
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered array with int-or-string keys.
    Array(VArray),
    /// A shared, mutable class instance.
    Instance(InstanceRef),
    /// A fixed-arity tuple.
    Tuple(Vec<Value>),
}

impl Value {
    /// The value's type the way the host runtime names it in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) | Value::Tuple(_) => "array",
            Value::Instance(_) => "object",
        }
    }

    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Identity equality for instances, structural equality for the rest.
///
/// Floats compare by IEEE equality, so a `NaN` default never compares
/// equal and is therefore never skipped as "still the default".
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<VArray> for Value {
    fn from(v: VArray) -> Self {
        Value::Array(v)
    }
}

impl From<InstanceRef> for Value {
    fn from(v: InstanceRef) -> Self {
        Value::Instance(v)
    }
}

/// A declared field default: the constant-expression subset of [`Value`].
///
/// Defaults can be scalars and arrays of scalars, never objects, so this
/// type stays free of shared handles and class definitions can live in
/// the process-wide registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered key/value pairs.
    Array(Vec<(ArrayKey, ConstValue)>),
}

impl ConstValue {
    /// Materializes the runtime value. Arrays come out fresh each call,
    /// the way a declared default is re-evaluated per instantiation.
    pub fn to_value(&self) -> Value {
        match self {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::Float(x) => Value::Float(*x),
            ConstValue::Str(s) => Value::String(s.clone()),
            ConstValue::Array(pairs) => {
                let mut arr = VArray::new();
                for (key, item) in pairs {
                    arr.insert(key.clone(), item.to_value());
                }
                Value::Array(arr)
            }
        }
    }

    /// Whether a runtime value equals this default.
    pub fn matches(&self, value: &Value) -> bool {
        self.to_value() == *value
    }
}

impl From<bool> for ConstValue {
    fn from(v: bool) -> Self {
        ConstValue::Bool(v)
    }
}

impl From<i64> for ConstValue {
    fn from(v: i64) -> Self {
        ConstValue::Int(v)
    }
}

impl From<f64> for ConstValue {
    fn from(v: f64) -> Self {
        ConstValue::Float(v)
    }
}

impl From<&str> for ConstValue {
    fn from(v: &str) -> Self {
        ConstValue::Str(v.to_string())
    }
}

impl From<String> for ConstValue {
    fn from(v: String) -> Self {
        ConstValue::Str(v)
    }
}
