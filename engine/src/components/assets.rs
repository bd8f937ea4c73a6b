//! Token pools across the configured token connectors

use super::{BroadcastManager, Component, MetricsManager, OperationsManager, TxHelper};
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::tokens;
use sdk::types::validate_name;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait AssetManager: Component {
    /// Names of the token connectors, in declaration order.
    fn connectors(&self) -> Vec<String>;

    /// Requests a new pool on `connector` and broadcasts its definition.
    async fn create_pool(&self, namespace: &str, connector: &str, name: &str)
        -> Result<Uuid, CoreError>;
}

pub struct Manager {
    tokens: Vec<(String, Arc<dyn tokens::Plugin>)>,
    broadcast: Arc<dyn BroadcastManager>,
    tx_helper: Arc<dyn TxHelper>,
    operations: Arc<dyn OperationsManager>,
    metrics: Arc<dyn MetricsManager>,
}

impl Manager {
    pub fn new(
        tokens: Vec<(String, Arc<dyn tokens::Plugin>)>,
        broadcast: Arc<dyn BroadcastManager>,
        tx_helper: Arc<dyn TxHelper>,
        operations: Arc<dyn OperationsManager>,
        metrics: Arc<dyn MetricsManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            broadcast,
            tx_helper,
            operations,
            metrics,
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "assets"
    }

    async fn start(&self) -> Result<(), CoreError> {
        info!(connectors = ?self.connectors(), "Asset manager started");
        Ok(())
    }
}

#[async_trait]
impl AssetManager for Manager {
    fn connectors(&self) -> Vec<String> {
        self.tokens.iter().map(|(name, _)| name.clone()).collect()
    }

    async fn create_pool(
        &self,
        namespace: &str,
        connector: &str,
        name: &str,
    ) -> Result<Uuid, CoreError> {
        let (_, plugin) = self
            .tokens
            .iter()
            .find(|(n, _)| n == connector)
            .ok_or_else(|| CoreError::UnknownTokens(connector.to_string()))?;
        validate_name("name", name)?;

        let tx = self
            .tx_helper
            .submit_new_transaction(namespace, "token_pool")
            .await?;
        let op = self
            .operations
            .start_operation(namespace, "token_create_pool", Some(tx));
        self.broadcast
            .broadcast_message(
                namespace,
                json!({
                    "definition": {
                        "type": "token_pool",
                        "name": name,
                        "connector": connector,
                        "plugin": plugin.name(),
                        "tx": tx,
                    }
                }),
            )
            .await?;
        self.metrics.increment("token_pools_requested");
        Ok(op)
    }
}
