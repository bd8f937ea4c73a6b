//! Private messaging between members over data exchange

use super::batch::{self, Batch, BatchDispatcher, BatchMessage};
use super::{BatchManager, BatchPinSubmitter, Component, DataManager, OperationsManager};
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::dataexchange;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait PrivateMessaging: Component {
    async fn send_message(
        &self,
        namespace: &str,
        recipients: Vec<String>,
        payload: serde_json::Value,
    ) -> Result<(), CoreError>;
}

pub struct Manager {
    data: Arc<dyn DataManager>,
    batch: Arc<dyn BatchManager>,
    data_exchange: Option<Arc<dyn dataexchange::Plugin>>,
    batch_pin: Arc<dyn BatchPinSubmitter>,
    operations: Arc<dyn OperationsManager>,
}

impl Manager {
    /// Builds the manager and registers it as the private batch dispatcher.
    pub fn new(
        data: Arc<dyn DataManager>,
        batch: Arc<dyn BatchManager>,
        data_exchange: Option<Arc<dyn dataexchange::Plugin>>,
        batch_pin: Arc<dyn BatchPinSubmitter>,
        operations: Arc<dyn OperationsManager>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            data,
            batch: Arc::clone(&batch),
            data_exchange,
            batch_pin,
            operations,
        });
        batch.register_dispatcher(batch::PRIVATE, Arc::clone(&manager) as Arc<dyn BatchDispatcher>);
        manager
    }

    fn data_exchange(&self) -> Result<&Arc<dyn dataexchange::Plugin>, CoreError> {
        self.data_exchange.as_ref().ok_or_else(|| CoreError::ComponentPrereqMissing {
            component: "messaging".to_string(),
            prerequisite: "dataexchange".to_string(),
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "messaging"
    }

    async fn start(&self) -> Result<(), CoreError> {
        match &self.data_exchange {
            Some(dx) => info!(dataexchange = dx.name(), "Private messaging started"),
            None => warn!("Private messaging started without data exchange; sends will fail"),
        }
        Ok(())
    }
}

#[async_trait]
impl PrivateMessaging for Manager {
    async fn send_message(
        &self,
        namespace: &str,
        recipients: Vec<String>,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.data_exchange()?;
        self.data.require_namespace(namespace).await?;
        self.batch
            .new_message(BatchMessage {
                namespace: namespace.to_string(),
                kind: batch::PRIVATE.to_string(),
                payload,
                recipients,
            })
            .await
    }
}

#[async_trait]
impl BatchDispatcher for Manager {
    /// Sends the batch to each distinct recipient, then pins it without a
    /// public payload reference.
    async fn dispatch_batch(&self, batch: Batch) -> Result<(), CoreError> {
        let dx = self.data_exchange()?;
        let body = serde_json::to_vec(&batch).map_err(|e| CoreError::plugin(dx.name(), e))?;
        let recipients: BTreeSet<&str> = batch
            .messages
            .iter()
            .flat_map(|m| m.recipients.iter().map(String::as_str))
            .collect();
        for peer in recipients {
            let op = self
                .operations
                .start_operation(&batch.namespace, "dataexchange_send_batch", Some(batch.tx));
            let sent = dx.send_message(peer, body.clone()).await;
            self.operations
                .complete_operation(op, sent.as_ref().map(|_| ()).map_err(|e| e.to_string()));
            sent?;
        }
        self.batch_pin.submit_pinned_batch(&batch, None).await?;
        Ok(())
    }
}
