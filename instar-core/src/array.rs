use core::fmt;

use indexmap::IndexMap;

use crate::Value;

/// A PHP array key: an integer, or a string that is not a canonical
/// decimal integer.
///
/// Constructing a key from a string coerces canonical integer spellings
/// (`"7"`, `"-3"`, but not `"07"`, `"1.0"` or `"-0"`) to [`ArrayKey::Int`],
/// matching the host runtime's key normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    /// Integer key.
    Int(i64),
    /// String key (never a canonical integer spelling).
    Str(String),
}

impl ArrayKey {
    /// Builds a key from a string, coercing canonical integers.
    pub fn from_string(s: impl Into<String>) -> ArrayKey {
        let s = s.into();
        match canonical_int(&s) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(s),
        }
    }

    /// The key rendered the way the host runtime prints it.
    pub fn as_display_string(&self) -> String {
        match self {
            ArrayKey::Int(i) => i.to_string(),
            ArrayKey::Str(s) => s.clone(),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_string(s)
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => write!(f, "{s}"),
        }
    }
}

fn canonical_int(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    let digits = match bytes {
        [] | [b'-'] => return None,
        [b'-', rest @ ..] => rest,
        _ => bytes,
    };
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    if !digits.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if bytes[0] == b'-' && digits == b"0" {
        return None;
    }
    s.parse::<i64>().ok()
}

/// A PHP array: insertion-ordered map from [`ArrayKey`] to [`Value`],
/// tracking the next append index.
#[derive(Debug, Clone, Default)]
pub struct VArray {
    entries: IndexMap<ArrayKey, Value>,
    next_index: i64,
}

impl VArray {
    /// An empty array.
    pub fn new() -> VArray {
        VArray::default()
    }

    /// Builds a list-shaped array from values, keyed `0..n`.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> VArray {
        let mut arr = VArray::new();
        for v in values {
            arr.push(v);
        }
        arr
    }

    /// Builds an array from explicit key/value pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ArrayKey, Value)>) -> VArray {
        let mut arr = VArray::new();
        for (k, v) in pairs {
            arr.insert(k, v);
        }
        arr
    }

    /// Sets `key` to `value`, replacing any previous entry in place.
    pub fn insert(&mut self, key: ArrayKey, value: Value) {
        if let ArrayKey::Int(i) = key
            && i >= self.next_index
        {
            self.next_index = i.saturating_add(1);
        }
        self.entries.insert(key, value);
    }

    /// Appends `value` under the next integer index.
    pub fn push(&mut self, value: Value) {
        let key = ArrayKey::Int(self.next_index);
        self.insert(key, value);
    }

    /// Looks up a key.
    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Looks up an integer key.
    pub fn get_int(&self, key: i64) -> Option<&Value> {
        self.entries.get(&ArrayKey::Int(key))
    }

    /// Looks up a string key (after canonical-integer coercion).
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.get(&ArrayKey::from_string(key))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the array has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter()
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// True when the keys are exactly `0, 1, .., len-1` in order.
    ///
    /// This is the strict check the binary codec uses to decide between the
    /// array and map wire families.
    pub fn is_list(&self) -> bool {
        self.entries
            .keys()
            .enumerate()
            .all(|(i, k)| *k == ArrayKey::Int(i as i64))
    }

    /// The pragmatic vector check used by the JSON codec: empty, or both
    /// key `0` and key `len-1` present (null values count as present).
    ///
    /// Deliberately cheaper than [`VArray::is_list`]; sparse arrays that
    /// happen to have both boundary keys pass it.
    pub fn is_vector_or_pseudo_vector(&self) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        self.entries.contains_key(&ArrayKey::Int(0))
            && self.entries.contains_key(&ArrayKey::Int(self.entries.len() as i64 - 1))
    }
}

/// Order-sensitive equality: same pairs in the same order. The append
/// index is not part of a value's identity.
impl PartialEq for VArray {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().zip(other.entries.iter()).all(|(a, b)| a == b)
    }
}

impl FromIterator<Value> for VArray {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        VArray::from_values(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_coerce_to_canonical_integers() {
        assert_eq!(ArrayKey::from_string("7"), ArrayKey::Int(7));
        assert_eq!(ArrayKey::from_string("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from_string("0"), ArrayKey::Int(0));
        assert_eq!(ArrayKey::from_string("07"), ArrayKey::Str("07".into()));
        assert_eq!(ArrayKey::from_string("-0"), ArrayKey::Str("-0".into()));
        assert_eq!(ArrayKey::from_string("1.0"), ArrayKey::Str("1.0".into()));
        assert_eq!(ArrayKey::from_string(""), ArrayKey::Str(String::new()));
        // out of i64 range stays a string key
        assert_eq!(
            ArrayKey::from_string("9223372036854775808"),
            ArrayKey::Str("9223372036854775808".into())
        );
    }

    #[test]
    fn push_follows_the_largest_integer_key() {
        let mut arr = VArray::new();
        arr.push(Value::Int(10));
        arr.insert(ArrayKey::Int(5), Value::Int(11));
        arr.push(Value::Int(12));
        assert_eq!(arr.get_int(0), Some(&Value::Int(10)));
        assert_eq!(arr.get_int(5), Some(&Value::Int(11)));
        assert_eq!(arr.get_int(6), Some(&Value::Int(12)));
    }

    #[test]
    fn list_check_is_strict_about_order_and_gaps() {
        let list = VArray::from_values([Value::Int(1), Value::Int(2)]);
        assert!(list.is_list());

        let mut gap = VArray::new();
        gap.insert(ArrayKey::Int(0), Value::Int(1));
        gap.insert(ArrayKey::Int(2), Value::Int(2));
        assert!(!gap.is_list());

        let mut keyed = VArray::new();
        keyed.insert(ArrayKey::from("x"), Value::Int(1));
        assert!(!keyed.is_list());
    }

    #[test]
    fn vector_check_only_probes_the_boundary_keys() {
        assert!(VArray::new().is_vector_or_pseudo_vector());

        let mut sparse = VArray::new();
        sparse.insert(ArrayKey::Int(0), Value::Int(1));
        sparse.insert(ArrayKey::Int(9), Value::Int(2));
        // len is 2, keys 0 and 1 probed, key 1 missing
        assert!(!sparse.is_vector_or_pseudo_vector());

        let mut mixed = VArray::new();
        mixed.insert(ArrayKey::Int(0), Value::Int(1));
        mixed.insert(ArrayKey::Int(1), Value::Int(2));
        mixed.insert(ArrayKey::from("x"), Value::Int(3));
        // len is 3, key 2 is absent
        assert!(!mixed.is_vector_or_pseudo_vector());

        // out-of-order integer keys still pass: only the boundaries are probed
        let mut pseudo = VArray::new();
        pseudo.insert(ArrayKey::Int(0), Value::Int(1));
        pseudo.insert(ArrayKey::Int(2), Value::Int(2));
        pseudo.insert(ArrayKey::Int(1), Value::Int(3));
        assert!(pseudo.is_vector_or_pseudo_vector());

        // null boundary values still count as present
        let nullish = VArray::from_values([Value::Null, Value::Int(1)]);
        assert!(nullish.is_vector_or_pseudo_vector());
    }

    #[test]
    fn equality_is_order_sensitive() {
        let mut a = VArray::new();
        a.insert(ArrayKey::from("x"), Value::Int(1));
        a.insert(ArrayKey::from("y"), Value::Int(2));

        let mut b = VArray::new();
        b.insert(ArrayKey::from("y"), Value::Int(2));
        b.insert(ArrayKey::from("x"), Value::Int(1));

        assert_ne!(a, b);
    }
}
