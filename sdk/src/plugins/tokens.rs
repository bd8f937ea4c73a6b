use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use crate::events::Callbacks;
use async_trait::async_trait;
use std::sync::Arc;

/// Connector to a token implementation (fungible or non-fungible pools).
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError>;

    async fn start(&self) -> Result<(), CoreError>;

    async fn wait_stop(&self);
}
