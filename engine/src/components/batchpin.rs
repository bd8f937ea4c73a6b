//! Pinning of dispatched batches to the blockchain

use super::batch::Batch;
use super::{Component, IdentityManager, MetricsManager, OperationsManager};
use async_trait::async_trait;
use sdk::errors::CoreError;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait BatchPinSubmitter: Component {
    /// Queues the on-chain pin for `batch` and returns the operation id.
    async fn submit_pinned_batch(
        &self,
        batch: &Batch,
        payload_ref: Option<&str>,
    ) -> Result<Uuid, CoreError>;
}

pub struct Manager {
    identity: Arc<dyn IdentityManager>,
    operations: Arc<dyn OperationsManager>,
    metrics: Arc<dyn MetricsManager>,
}

impl Manager {
    pub fn new(
        identity: Arc<dyn IdentityManager>,
        operations: Arc<dyn OperationsManager>,
        metrics: Arc<dyn MetricsManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            operations,
            metrics,
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "batchpin"
    }
}

#[async_trait]
impl BatchPinSubmitter for Manager {
    async fn submit_pinned_batch(
        &self,
        batch: &Batch,
        payload_ref: Option<&str>,
    ) -> Result<Uuid, CoreError> {
        let signer = self.identity.org_signing_key().ok_or_else(|| {
            CoreError::Config("org.key is required to pin batches".to_string())
        })?;
        let op = self
            .operations
            .start_operation(&batch.namespace, "blockchain_pin_batch", Some(batch.tx));
        self.metrics.increment("batchpin_submitted");
        debug!(batch = %batch.id, op = %op, signer, payload_ref, "Batch pin queued");
        Ok(op)
    }
}
