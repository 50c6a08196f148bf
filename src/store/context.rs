//! Counter namespaces and composite storage keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the context and the counter key in persisted keys.
pub(crate) const CONTEXT_SEPARATOR: &str = "__";

/// A namespace isolating counters that share one store.
///
/// Equality and hashing follow the underlying string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    /// Name of the context used when callers do not need isolation.
    pub const DEFAULT: &'static str = "default";

    /// Create a context from its raw name.
    ///
    /// Names must not contain `"__"`. Persisted keys are flat
    /// `"{context}__{key}"` strings, so such a context could share entries
    /// with another context. Rules loaded from configuration reject them.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw context name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether persisted keys of this context can be told apart from every
    /// other context's.
    pub fn is_unambiguous(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(CONTEXT_SEPARATOR)
    }

    /// Prefix shared by every persisted key of this context.
    pub(crate) fn key_prefix(&self) -> String {
        format!("{}{}", self.0, CONTEXT_SEPARATOR)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Context {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Context {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Build the persisted key for a counter key inside a context.
///
/// Format: `"{context}__{key}"`.
pub fn storage_key(key: &str, context: &Context) -> String {
    format!("{}{}{}", context.0, CONTEXT_SEPARATOR, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_context() {
        assert_eq!(Context::default().as_str(), "default");
        assert_eq!(Context::default(), Context::from("default"));
    }

    #[test]
    fn test_storage_key_format() {
        let context = Context::new("ads");
        assert_eq!(
            storage_key("daily_D_2016105", &context),
            "ads__daily_D_2016105"
        );
        assert!(storage_key("x", &context).starts_with(&context.key_prefix()));
    }

    #[test]
    fn test_separator_in_context_is_ambiguous() {
        assert!(Context::new("ads").is_unambiguous());
        assert!(Context::new("ads_v2").is_unambiguous());
        assert!(!Context::new("a__b").is_unambiguous());
        assert!(!Context::new("").is_unambiguous());

        // Both of these flatten to the same persisted key.
        assert_eq!(
            storage_key("b__c", &Context::new("a")),
            storage_key("c", &Context::new("a__b"))
        );
    }

    #[test]
    fn test_context_hashing_by_value() {
        let mut set = HashSet::new();
        set.insert(Context::new("a"));
        set.insert(Context::from("a".to_string()));
        set.insert(Context::new("b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_context_serializes_as_string() {
        let json = serde_json::to_string(&Context::new("ads")).unwrap();
        assert_eq!(json, "\"ads\"");

        let parsed: Context = serde_yaml::from_str("billing").unwrap();
        assert_eq!(parsed.as_str(), "billing");
    }
}
