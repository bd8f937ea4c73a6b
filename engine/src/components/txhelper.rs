//! Transaction bookkeeping shared by the managers that submit work

use super::Component;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::database;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait TxHelper: Component {
    /// Allocates a transaction id in `namespace`, which must exist.
    async fn submit_new_transaction(&self, namespace: &str, tx_type: &str)
        -> Result<Uuid, CoreError>;
}

pub struct Manager {
    database: Arc<dyn database::Plugin>,
}

impl Manager {
    pub fn new(database: Arc<dyn database::Plugin>) -> Arc<Self> {
        Arc::new(Self { database })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "txhelper"
    }
}

#[async_trait]
impl TxHelper for Manager {
    async fn submit_new_transaction(
        &self,
        namespace: &str,
        tx_type: &str,
    ) -> Result<Uuid, CoreError> {
        if self.database.get_namespace(namespace).await?.is_none() {
            return Err(CoreError::Database(format!(
                "namespace '{}' not found",
                namespace
            )));
        }
        let id = Uuid::new_v4();
        debug!(namespace, tx_type, tx = %id, "New transaction");
        Ok(id)
    }
}
