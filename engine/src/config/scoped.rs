//! Scoped plugin configuration
//!
//! Backs [`sdk::config::ConfigHandle`] with one raw TOML table. Keys are
//! dotted paths relative to the table, so `ethconnect.url` reads
//! `[plugins.blockchain.ethereum.ethconnect] url = ...`.

use super::RawSection;
use sdk::config::{ConfigHandle, ConfigHandleImpl};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedConfig {
    scope: String,
    values: RawSection,
}

impl ScopedConfig {
    pub fn new(scope: impl Into<String>, values: RawSection) -> Self {
        Self {
            scope: scope.into(),
            values,
        }
    }

    /// A scope with no keys, used for synthesized descriptors.
    pub fn empty(scope: impl Into<String>) -> Self {
        Self::new(scope, RawSection::new())
    }

    /// Takes the table found at `key` inside `section`. Anything that is not
    /// a table yields an empty scope.
    pub fn subsection(scope: impl Into<String>, section: &RawSection, key: &str) -> Self {
        let values = match section.get(key) {
            Some(Value::Object(map)) => map.clone(),
            _ => RawSection::new(),
        };
        Self::new(scope, values)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn values(&self) -> &RawSection {
        &self.values
    }

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn handle(&self) -> ConfigHandle {
        ConfigHandle::new(Arc::new(self.clone()))
    }
}

impl ConfigHandleImpl for ScopedConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).cloned()
    }

    fn scope(&self) -> &str {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section(value: Value) -> RawSection {
        match value {
            Value::Object(map) => map,
            _ => RawSection::new(),
        }
    }

    #[test]
    fn dotted_keys_walk_nested_tables() {
        let scoped = ScopedConfig::new(
            "plugins.blockchain[0].ethereum",
            section(json!({ "ethconnect": { "url": "http://eth", "ws": { "url": "ws://eth/ws" } } })),
        );
        let handle = scoped.handle();
        assert_eq!(handle.get_string("ethconnect.url").as_deref(), Some("http://eth"));
        assert_eq!(handle.get_string("ethconnect.ws.url").as_deref(), Some("ws://eth/ws"));
        assert_eq!(handle.get("ethconnect.missing"), None);
        assert_eq!(handle.scope(), "plugins.blockchain[0].ethereum");
    }

    #[test]
    fn subsection_of_non_table_is_empty() {
        let parent = section(json!({ "type": "postgres", "postgres": "oops" }));
        let scoped = ScopedConfig::subsection("database.postgres", &parent, "postgres");
        assert!(scoped.values().is_empty());
        let missing = ScopedConfig::subsection("database.sqlite3", &parent, "sqlite3");
        assert!(missing.values().is_empty());
    }
}
