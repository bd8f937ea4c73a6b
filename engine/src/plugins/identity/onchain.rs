//! On-chain identity
//!
//! Signing keys are blockchain keys, so resolution is delegated to the
//! blockchain plugin bound after blockchains initialize.

use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::plugins::{blockchain, identity, PluginContext};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

const PLUGIN_TYPE: &str = "onchain";

#[derive(Default)]
pub struct Onchain {
    blockchain: OnceLock<Arc<dyn blockchain::Plugin>>,
}

impl Onchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.blockchain.get().is_some()
    }
}

#[async_trait]
impl identity::Plugin for Onchain {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(&mut self, ctx: &PluginContext, _config: &ConfigHandle) -> Result<(), CoreError> {
        debug!(plugin = %ctx.name, "On-chain identity initialized");
        Ok(())
    }

    fn bind_blockchain(&self, blockchain: Arc<dyn blockchain::Plugin>) {
        if self.blockchain.set(blockchain).is_err() {
            warn!("On-chain identity already bound; keeping the first blockchain");
        }
    }

    async fn resolve_signing_key(&self, namespace: &str, key: &str) -> Result<String, CoreError> {
        let blockchain = self.blockchain.get().ok_or_else(|| {
            CoreError::invalid_state("resolve signing key", "no blockchain bound")
        })?;
        blockchain.verify_identity_syntax(namespace, key).await
    }
}
