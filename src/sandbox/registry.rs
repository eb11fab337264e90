//! Delegate template registry.
//!
//! Two maps keyed by `name:variant`: the winning priority and the winning
//! template. Both belong to one context and are cleared together.

use rustc_hash::FxHashMap;

#[derive(Debug, Default, Clone)]
pub struct OverrideRegistry {
    priorities: FxHashMap<String, i64>,
    functions: FxHashMap<String, String>,
}

fn key(name: &str, variant: &str) -> String {
    format!("{name}:{variant}")
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target` as an implementation of `name`/`variant`.
    ///
    /// A higher priority replaces the current winner, a lower one is ignored
    /// and an equal one is a conflict.
    pub fn register(
        &mut self,
        name: &str,
        variant: &str,
        priority: i64,
        target: &str,
    ) -> Result<(), String> {
        let key = key(name, variant);
        match self.priorities.get(&key) {
            Some(&current) if current == priority => Err(format!(
                "two active delegates for `{key}` with priority {priority}: `{}` and `{target}`",
                self.functions.get(&key).map_or("?", String::as_str)
            )),
            Some(&current) if current > priority => Ok(()),
            _ => {
                self.priorities.insert(key.clone(), priority);
                self.functions.insert(key, target.to_string());
                Ok(())
            }
        }
    }

    /// Winning template for `name`/`variant`, falling back to the default variant.
    pub fn resolve(&self, name: &str, variant: &str) -> Option<&str> {
        self.functions
            .get(&key(name, variant))
            .or_else(|| {
                (!variant.is_empty())
                    .then(|| self.functions.get(&key(name, "")))
                    .flatten()
            })
            .map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.priorities.clear();
        self.functions.clear();
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rules() {
        let mut registry = OverrideRegistry::new();
        registry.register("mail.sig", "", 0, "base.sig").unwrap();
        registry.register("mail.sig", "", 1, "custom.sig").unwrap();
        assert_eq!(registry.resolve("mail.sig", ""), Some("custom.sig"));

        registry.register("mail.sig", "", 0, "late.sig").unwrap();
        assert_eq!(registry.resolve("mail.sig", ""), Some("custom.sig"));

        let err = registry.register("mail.sig", "", 1, "dup.sig").unwrap_err();
        assert!(err.contains("custom.sig"));
        assert!(err.contains("dup.sig"));
    }

    #[test]
    fn test_variant_fallback() {
        let mut registry = OverrideRegistry::new();
        registry.register("mail.sig", "", 0, "base.sig").unwrap();
        registry.register("mail.sig", "short", 0, "short.sig").unwrap();
        assert_eq!(registry.resolve("mail.sig", "short"), Some("short.sig"));
        assert_eq!(registry.resolve("mail.sig", "long"), Some("base.sig"));
        assert_eq!(registry.resolve("mail.other", ""), None);
    }

    #[test]
    fn test_clear() {
        let mut registry = OverrideRegistry::new();
        registry.register("a", "", 0, "x").unwrap();
        registry.clear();
        assert!(registry.is_empty());
        registry.register("a", "", 0, "x").unwrap();
        assert_eq!(registry.len(), 1);
    }
}
