//! Scoped configuration handed to plugins
//!
//! A plugin never sees the whole config file. It receives a [`ConfigHandle`]
//! rooted at its own section (for example `plugins.blockchain[0].ethereum`),
//! and reads keys relative to that root. Dotted keys walk nested tables.

use crate::errors::CoreError;
use std::sync::Arc;

/// Handle for configuration access
///
/// Provides read-only access to configuration values.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<dyn ConfigHandleImpl>,
}

impl ConfigHandle {
    /// Create a new ConfigHandle with the given implementation
    pub fn new(inner: Arc<dyn ConfigHandleImpl>) -> Self {
        Self { inner }
    }

    /// Where this handle is rooted, for logs and error messages.
    pub fn scope(&self) -> &str {
        self.inner.scope()
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key)
    }

    /// Get a configuration value as a string
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    /// Get a configuration value as an integer
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    /// Get a configuration value as a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Get a non-empty string, or `FF10138` naming `key` and `owner`.
    pub fn require_string(&self, key: &str, owner: &str) -> Result<String, CoreError> {
        match self.get_string(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(CoreError::MissingPluginConfig {
                key: key.to_string(),
                plugin: owner.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("scope", &self.scope())
            .finish()
    }
}

/// Trait for config handle implementation (to be implemented by engine)
pub trait ConfigHandleImpl: Send + Sync {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    fn scope(&self) -> &str;
}
