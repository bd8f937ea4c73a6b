//! Broadcast of messages to every member via shared storage

use super::batch::{self, Batch, BatchDispatcher, BatchMessage};
use super::{BatchManager, BatchPinSubmitter, Component, DataManager, OperationsManager};
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::sharedstorage;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait BroadcastManager: Component {
    async fn broadcast_message(
        &self,
        namespace: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError>;
}

pub struct Manager {
    data: Arc<dyn DataManager>,
    batch: Arc<dyn BatchManager>,
    shared_storage: Arc<dyn sharedstorage::Plugin>,
    batch_pin: Arc<dyn BatchPinSubmitter>,
    operations: Arc<dyn OperationsManager>,
}

impl Manager {
    /// Builds the manager and registers it as the broadcast batch dispatcher.
    pub fn new(
        data: Arc<dyn DataManager>,
        batch: Arc<dyn BatchManager>,
        shared_storage: Arc<dyn sharedstorage::Plugin>,
        batch_pin: Arc<dyn BatchPinSubmitter>,
        operations: Arc<dyn OperationsManager>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            data,
            batch: Arc::clone(&batch),
            shared_storage,
            batch_pin,
            operations,
        });
        batch.register_dispatcher(batch::BROADCAST, Arc::clone(&manager) as Arc<dyn BatchDispatcher>);
        manager
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn start(&self) -> Result<(), CoreError> {
        info!(storage = self.shared_storage.name(), "Broadcast manager started");
        Ok(())
    }
}

#[async_trait]
impl BroadcastManager for Manager {
    async fn broadcast_message(
        &self,
        namespace: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.data.require_namespace(namespace).await?;
        self.batch
            .new_message(BatchMessage {
                namespace: namespace.to_string(),
                kind: batch::BROADCAST.to_string(),
                payload,
                recipients: Vec::new(),
            })
            .await
    }
}

#[async_trait]
impl BatchDispatcher for Manager {
    /// Uploads the serialized batch, then pins its reference on chain.
    async fn dispatch_batch(&self, batch: Batch) -> Result<(), CoreError> {
        let op = self
            .operations
            .start_operation(&batch.namespace, "sharedstorage_upload_batch", Some(batch.tx));
        let body = serde_json::to_vec(&batch)
            .map_err(|e| CoreError::plugin(self.shared_storage.name(), e))?;
        let payload_ref = match self.shared_storage.upload(body).await {
            Ok(payload_ref) => {
                self.operations.complete_operation(op, Ok(()));
                payload_ref
            }
            Err(e) => {
                self.operations.complete_operation(op, Err(e.to_string()));
                return Err(e);
            }
        };
        self.batch_pin
            .submit_pinned_batch(&batch, Some(&payload_ref))
            .await?;
        Ok(())
    }
}
