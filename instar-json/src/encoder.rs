//! Named encoder profiles.
//!
//! An encoder bundles the baseline JSON policy a class is serialized
//! under: how field names map to keys, which visibilities participate,
//! whether default values are written, and the float precision. Class
//! and field tags override these per use. Profiles live in a global
//! registry under their fully-qualified name; `@kphp-json for Name`
//! tags resolve against it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::JsonPolicyError;

/// The encoder every call uses unless another profile is named.
pub const DEFAULT_ENCODER: &str = "JsonEncoder";

/// How field names become JSON keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenamePolicy {
    /// Keys are the field names as written.
    #[default]
    None,
    /// `userName` becomes `user_name`.
    SnakeCase,
    /// `user_name` becomes `userName`.
    CamelCase,
}

impl RenamePolicy {
    /// Applies the policy to one field name.
    pub fn apply(self, name: &str) -> String {
        match self {
            RenamePolicy::None => name.to_string(),
            RenamePolicy::SnakeCase => {
                let mut out = String::with_capacity(name.len() + 4);
                for c in name.chars() {
                    if c.is_ascii_uppercase() && !out.is_empty() && !out.ends_with('_') {
                        out.push('_');
                    }
                    out.push(c.to_ascii_lowercase());
                }
                out
            }
            RenamePolicy::CamelCase => {
                let mut out = String::with_capacity(name.len());
                let mut chars = name.chars().peekable();
                if chars.peek() == Some(&'_') {
                    out.push('_');
                    chars.next();
                }
                while let Some(c) = chars.next() {
                    if c == '_' {
                        match chars.next() {
                            Some(next) => out.push(next.to_ascii_uppercase()),
                            None => out.push('_'),
                        }
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

/// Which fields participate in JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// Every instance field.
    #[default]
    All,
    /// Public instance fields only.
    Public,
}

/// A registered encoder profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonEncoder {
    name: String,
    rename_policy: RenamePolicy,
    visibility_policy: VisibilityPolicy,
    skip_if_default: bool,
    float_precision: u32,
}

impl JsonEncoder {
    /// Starts a profile under this fully-qualified name.
    pub fn builder(name: impl Into<String>) -> JsonEncoderBuilder {
        JsonEncoderBuilder {
            encoder: JsonEncoder {
                name: trim_leading_backslash(name.into()),
                rename_policy: RenamePolicy::None,
                visibility_policy: VisibilityPolicy::All,
                skip_if_default: false,
                float_precision: 0,
            },
        }
    }

    /// The profile's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Baseline key policy.
    pub fn rename_policy(&self) -> RenamePolicy {
        self.rename_policy
    }

    /// Baseline visibility filter.
    pub fn visibility_policy(&self) -> VisibilityPolicy {
        self.visibility_policy
    }

    /// Whether fields holding their default are dropped by default.
    pub fn skip_if_default(&self) -> bool {
        self.skip_if_default
    }

    /// Baseline float precision; zero means full precision.
    pub fn float_precision(&self) -> u32 {
        self.float_precision
    }
}

/// Builder returned by [`JsonEncoder::builder`].
#[derive(Debug)]
pub struct JsonEncoderBuilder {
    encoder: JsonEncoder,
}

impl JsonEncoderBuilder {
    /// Sets the key policy.
    pub fn rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.encoder.rename_policy = policy;
        self
    }

    /// Sets the visibility filter.
    pub fn visibility_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.encoder.visibility_policy = policy;
        self
    }

    /// Drops fields holding their default value.
    pub fn skip_if_default(mut self, skip: bool) -> Self {
        self.encoder.skip_if_default = skip;
        self
    }

    /// Rounds every double to this many decimal digits.
    pub fn float_precision(mut self, precision: u32) -> Self {
        self.encoder.float_precision = precision;
        self
    }

    /// Publishes the profile in the global registry.
    pub fn register(self) -> Result<Arc<JsonEncoder>, JsonPolicyError> {
        let mut map = write_lock(registry());
        if map.contains_key(&self.encoder.name) {
            return Err(JsonPolicyError::DuplicateEncoder {
                name: self.encoder.name,
            });
        }
        let encoder = Arc::new(self.encoder);
        map.insert(encoder.name.clone(), Arc::clone(&encoder));
        Ok(encoder)
    }
}

type Registry = RwLock<HashMap<String, Arc<JsonEncoder>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let default = Arc::new(JsonEncoder {
            name: DEFAULT_ENCODER.to_string(),
            rename_policy: RenamePolicy::None,
            visibility_policy: VisibilityPolicy::All,
            skip_if_default: false,
            float_precision: 0,
        });
        let mut map = HashMap::new();
        map.insert(default.name.clone(), default);
        RwLock::new(map)
    })
}

/// Looks up a registered profile by name.
pub fn json_encoder(name: &str) -> Result<Arc<JsonEncoder>, JsonPolicyError> {
    let key = name.strip_prefix('\\').unwrap_or(name);
    read_lock(registry())
        .get(key)
        .map(Arc::clone)
        .ok_or_else(|| JsonPolicyError::UnknownEncoder {
            name: key.to_string(),
        })
}

/// Whether a profile with this name is registered.
pub fn encoder_exists(name: &str) -> bool {
    let key = name.strip_prefix('\\').unwrap_or(name);
    read_lock(registry()).contains_key(key)
}

fn trim_leading_backslash(name: String) -> String {
    match name.strip_prefix('\\') {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_breaks_on_uppercase() {
        let p = RenamePolicy::SnakeCase;
        assert_eq!(p.apply("userName"), "user_name");
        assert_eq!(p.apply("PackedOrder"), "packed_order");
        assert_eq!(p.apply("already_snake"), "already_snake");
        assert_eq!(p.apply("a_B"), "a_b");
        assert_eq!(p.apply("HTMLBody"), "h_t_m_l_body");
    }

    #[test]
    fn camel_case_consumes_underscores() {
        let p = RenamePolicy::CamelCase;
        assert_eq!(p.apply("user_name"), "userName");
        assert_eq!(p.apply("_user_name"), "_userName");
        assert_eq!(p.apply("user_"), "user_");
        assert_eq!(p.apply("__x"), "_X");
        assert_eq!(p.apply("id"), "id");
    }

    #[test]
    fn none_policy_keeps_names() {
        assert_eq!(RenamePolicy::None.apply("A_weird_Name"), "A_weird_Name");
    }

    #[test]
    fn default_encoder_is_preseeded() {
        let enc = json_encoder(DEFAULT_ENCODER).unwrap();
        assert_eq!(enc.name(), "JsonEncoder");
        assert_eq!(enc.rename_policy(), RenamePolicy::None);
        assert_eq!(enc.visibility_policy(), VisibilityPolicy::All);
        assert!(!enc.skip_if_default());
        assert_eq!(enc.float_precision(), 0);
        assert!(encoder_exists("\\JsonEncoder"));
    }

    #[test]
    fn builder_registers_a_profile() {
        JsonEncoder::builder("jenc\\CompactEnc")
            .rename_policy(RenamePolicy::SnakeCase)
            .visibility_policy(VisibilityPolicy::Public)
            .skip_if_default(true)
            .float_precision(2)
            .register()
            .unwrap();
        let enc = json_encoder("jenc\\CompactEnc").unwrap();
        assert_eq!(enc.rename_policy(), RenamePolicy::SnakeCase);
        assert_eq!(enc.visibility_policy(), VisibilityPolicy::Public);
        assert!(enc.skip_if_default());
        assert_eq!(enc.float_precision(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        JsonEncoder::builder("jenc\\DupEnc").register().unwrap();
        let err = JsonEncoder::builder("jenc\\DupEnc").register().unwrap_err();
        assert_eq!(
            err.to_string(),
            "json encoder jenc\\DupEnc is already registered"
        );
    }

    #[test]
    fn unknown_names_are_reported() {
        let err = json_encoder("jenc\\Nope").unwrap_err();
        assert_eq!(err.to_string(), "json encoder jenc\\Nope is not registered");
    }
}
