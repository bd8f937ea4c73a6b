//! Custom smart contract invocation

use super::{Component, IdentityManager, OperationsManager, TxHelper};
use async_trait::async_trait;
use sdk::errors::CoreError;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ContractManager: Component {
    /// Queues an invocation of `method` at `location`, signed by `signer` or
    /// by the org key when no signer is given. Returns the operation id.
    async fn invoke_contract(
        &self,
        namespace: &str,
        signer: Option<&str>,
        location: serde_json::Value,
        method: &str,
    ) -> Result<Uuid, CoreError>;
}

pub struct Manager {
    identity: Arc<dyn IdentityManager>,
    tx_helper: Arc<dyn TxHelper>,
    operations: Arc<dyn OperationsManager>,
}

impl Manager {
    pub fn new(
        identity: Arc<dyn IdentityManager>,
        tx_helper: Arc<dyn TxHelper>,
        operations: Arc<dyn OperationsManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            tx_helper,
            operations,
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "contracts"
    }
}

#[async_trait]
impl ContractManager for Manager {
    async fn invoke_contract(
        &self,
        namespace: &str,
        signer: Option<&str>,
        location: serde_json::Value,
        method: &str,
    ) -> Result<Uuid, CoreError> {
        let signer = match signer {
            Some(key) => self.identity.normalize_signing_key(namespace, key).await?,
            None => self
                .identity
                .org_signing_key()
                .map(str::to_string)
                .ok_or_else(|| CoreError::Config("org.key is required to invoke contracts".to_string()))?,
        };
        let tx = self
            .tx_helper
            .submit_new_transaction(namespace, "contract_invoke")
            .await?;
        let op = self
            .operations
            .start_operation(namespace, "blockchain_invoke", Some(tx));
        debug!(op = %op, signer = %signer, method, location = %location, "Contract invoke queued");
        Ok(op)
    }
}
