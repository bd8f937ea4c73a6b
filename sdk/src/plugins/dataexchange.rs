use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use crate::events::Callbacks;
use async_trait::async_trait;
use std::sync::Arc;

/// Private point-to-point transport between member nodes.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// `nodes` are the profiles of every node identity already registered,
    /// so the connector can re-establish its peer list.
    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        nodes: Vec<serde_json::Value>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError>;

    /// This node's own endpoint profile, as published to peers.
    async fn endpoint_info(&self) -> Result<serde_json::Value, CoreError>;

    /// Sends an opaque payload to `peer`, returning the transfer id.
    async fn send_message(&self, peer: &str, payload: Vec<u8>) -> Result<String, CoreError>;
}
