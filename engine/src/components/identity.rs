//! Signing identity resolution for this node

use super::Component;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::{blockchain, database, identity};
use sdk::types::{Identity, IdentityFilter, IdentityType, SYSTEM_NAMESPACE};
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait IdentityManager: Component {
    /// Validates `key` against the node's identity plugin and returns its
    /// canonical form.
    async fn normalize_signing_key(&self, namespace: &str, key: &str) -> Result<String, CoreError>;

    /// The org key from config in canonical form, when one is configured.
    fn org_signing_key(&self) -> Option<&str>;

    async fn node_identities(&self) -> Result<Vec<Identity>, CoreError>;
}

pub struct Manager {
    database: Arc<dyn database::Plugin>,
    blockchain: Arc<dyn blockchain::Plugin>,
    identity: Option<Arc<dyn identity::Plugin>>,
    org_key: Option<String>,
}

impl Manager {
    /// Builds the manager and resolves `org_key` up front, so a node with a
    /// malformed org key fails at init rather than on first submit.
    pub async fn new(
        database: Arc<dyn database::Plugin>,
        blockchain: Arc<dyn blockchain::Plugin>,
        identity: Option<Arc<dyn identity::Plugin>>,
        org_key: Option<String>,
    ) -> Result<Arc<Self>, CoreError> {
        let mut manager = Self {
            database,
            blockchain,
            identity,
            org_key: None,
        };
        if let Some(key) = org_key {
            let resolved = manager.normalize_signing_key(SYSTEM_NAMESPACE, &key).await?;
            info!(key = %resolved, "Org signing key resolved");
            manager.org_key = Some(resolved);
        }
        Ok(Arc::new(manager))
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "identity"
    }
}

#[async_trait]
impl IdentityManager for Manager {
    async fn normalize_signing_key(&self, namespace: &str, key: &str) -> Result<String, CoreError> {
        match &self.identity {
            Some(plugin) => plugin.resolve_signing_key(namespace, key).await,
            None => self.blockchain.verify_identity_syntax(namespace, key).await,
        }
    }

    fn org_signing_key(&self) -> Option<&str> {
        self.org_key.as_deref()
    }

    async fn node_identities(&self) -> Result<Vec<Identity>, CoreError> {
        let (nodes, _) = self
            .database
            .get_identities(&IdentityFilter::by_type(IdentityType::Node))
            .await?;
        Ok(nodes)
    }
}
