//! Membership view: registered nodes and this node's own endpoint

use super::{Component, IdentityManager};
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::dataexchange;
use sdk::types::Identity;
use std::sync::Arc;

#[async_trait]
pub trait NetworkMap: Component {
    async fn get_nodes(&self) -> Result<Vec<Identity>, CoreError>;

    /// Endpoint profile published by data exchange, if one is configured.
    async fn local_node_profile(&self) -> Result<Option<serde_json::Value>, CoreError>;
}

pub struct Manager {
    identity: Arc<dyn IdentityManager>,
    data_exchange: Option<Arc<dyn dataexchange::Plugin>>,
}

impl Manager {
    pub fn new(
        identity: Arc<dyn IdentityManager>,
        data_exchange: Option<Arc<dyn dataexchange::Plugin>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            data_exchange,
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "networkmap"
    }
}

#[async_trait]
impl NetworkMap for Manager {
    async fn get_nodes(&self) -> Result<Vec<Identity>, CoreError> {
        self.identity.node_identities().await
    }

    async fn local_node_profile(&self) -> Result<Option<serde_json::Value>, CoreError> {
        match &self.data_exchange {
            Some(dx) => dx.endpoint_info().await.map(Some),
            None => Ok(None),
        }
    }
}
