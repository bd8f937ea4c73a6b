use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use crate::events::Callbacks;
use async_trait::async_trait;
use std::sync::Arc;

/// Content store for broadcast payloads.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError>;

    /// Stores `data` and returns the reference other nodes use to fetch it.
    async fn upload(&self, data: Vec<u8>) -> Result<String, CoreError>;

    async fn download(&self, payload_ref: &str) -> Result<Vec<u8>, CoreError>;
}
