use super::PluginContext;
use crate::config::ConfigHandle;
use crate::errors::CoreError;
use crate::events::Callbacks;
use crate::metrics::Metrics;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin type name, e.g. `ethereum`
    fn name(&self) -> &str;

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        metrics: Arc<dyn Metrics>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError>;

    /// Begins listening for events. Returns once the listener is spawned.
    async fn start(&self) -> Result<(), CoreError>;

    /// Waits for background tasks to exit after the context is cancelled.
    async fn wait_stop(&self);

    /// Validates a signing key and returns its canonical form.
    async fn verify_identity_syntax(&self, namespace: &str, key: &str) -> Result<String, CoreError>;
}
