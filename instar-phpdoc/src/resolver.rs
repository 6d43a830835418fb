use indexmap::IndexMap;

use instar_core::ClassDef;

/// Resolves relative class names the way the owning class's file would:
/// import aliases, `self`, and namespace prefixing.
///
/// Pure lookup over the class's registered import table; nothing is read
/// from disk.
#[derive(Debug, Clone)]
pub struct UseResolver {
    class_fqn: String,
    namespace: String,
    aliases: IndexMap<String, String>,
}

impl UseResolver {
    /// Builds a resolver from a registered class definition.
    pub fn for_class(def: &ClassDef) -> UseResolver {
        UseResolver {
            class_fqn: def.name().to_string(),
            namespace: def.namespace().to_string(),
            aliases: def
                .uses()
                .map(|(a, t)| (a.to_string(), t.to_string()))
                .collect(),
        }
    }

    /// Builds a resolver from raw parts.
    pub fn from_parts(
        class_fqn: impl Into<String>,
        namespace: impl Into<String>,
        aliases: impl IntoIterator<Item = (String, String)>,
    ) -> UseResolver {
        UseResolver {
            class_fqn: class_fqn.into(),
            namespace: namespace.into(),
            aliases: aliases.into_iter().collect(),
        }
    }

    /// The owning class's fully-qualified name.
    pub fn class_fqn(&self) -> &str {
        &self.class_fqn
    }

    /// Resolves a name as written in a docblock to a fully-qualified
    /// name without a leading backslash.
    ///
    /// In order: an absolute `\Name` is returned as-is; `self` names the
    /// owning class; a first segment matching an import alias is replaced
    /// by the alias target; anything else gets the owning namespace
    /// prefixed.
    pub fn resolve(&self, name: &str) -> String {
        if let Some(rest) = name.strip_prefix('\\') {
            return rest.to_string();
        }
        if name == "self" {
            return self.class_fqn.clone();
        }
        let first_len = name.find('\\').unwrap_or(name.len());
        let first = &name[..first_len];
        if let Some(target) = self.aliases.get(first) {
            return format!("{target}{}", &name[first_len..]);
        }
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{name}", self.namespace)
        }
    }
}
