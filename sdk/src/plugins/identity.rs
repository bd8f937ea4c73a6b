use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&mut self, ctx: &PluginContext, config: &ConfigHandle) -> Result<(), CoreError>;

    /// Gives the plugin the blockchain it resolves keys against. Called once
    /// after blockchain plugins are initialized.
    fn bind_blockchain(&self, blockchain: Arc<dyn super::blockchain::Plugin>);

    async fn resolve_signing_key(&self, namespace: &str, key: &str) -> Result<String, CoreError>;
}
