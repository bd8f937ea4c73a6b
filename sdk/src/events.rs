//! Plugin events and the callbacks that receive them

use crate::errors::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Something a plugin observed on its connector: a blockchain event, a
/// token transfer, a received data exchange message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEvent {
    /// Plugin category, e.g. `blockchain`
    pub category: String,
    /// Instance name of the emitting plugin
    pub plugin: String,
    /// Connector-specific event kind
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PluginEvent {
    pub fn new(
        category: impl Into<String>,
        plugin: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            category: category.into(),
            plugin: plugin.into(),
            kind: kind.into(),
            payload,
        }
    }
}

/// Sink for plugin events. Plugins receive one at init and call it from
/// their background tasks.
#[async_trait]
pub trait Callbacks: Send + Sync {
    async fn deliver(&self, event: PluginEvent) -> Result<(), CoreError>;
}
