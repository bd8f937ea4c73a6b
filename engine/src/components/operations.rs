//! Tracking of operations submitted to connectors

use super::Component;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: Uuid,
    pub namespace: String,
    pub op_type: String,
    pub tx: Option<Uuid>,
    pub status: OperationStatus,
    pub updated: DateTime<Utc>,
}

pub trait OperationsManager: Component {
    fn start_operation(&self, namespace: &str, op_type: &str, tx: Option<Uuid>) -> Uuid;

    fn complete_operation(&self, id: Uuid, outcome: Result<(), String>);

    fn get_operation(&self, id: Uuid) -> Option<Operation>;
}

#[derive(Default)]
pub struct Manager {
    operations: Mutex<HashMap<Uuid, Operation>>,
}

impl Manager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn pending(&self) -> usize {
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|op| op.status == OperationStatus::Pending)
            .count()
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "operations"
    }

    async fn start(&self) -> Result<(), sdk::errors::CoreError> {
        info!(pending = self.pending(), "Operations manager started");
        Ok(())
    }
}

impl OperationsManager for Manager {
    fn start_operation(&self, namespace: &str, op_type: &str, tx: Option<Uuid>) -> Uuid {
        let op = Operation {
            id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            op_type: op_type.to_string(),
            tx,
            status: OperationStatus::Pending,
            updated: Utc::now(),
        };
        let id = op.id;
        debug!(op = %id, op_type, "Operation started");
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, op);
        id
    }

    fn complete_operation(&self, id: Uuid, outcome: Result<(), String>) {
        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(op) = operations.get_mut(&id) {
            op.status = match outcome {
                Ok(()) => OperationStatus::Succeeded,
                Err(e) => OperationStatus::Failed(e),
            };
            op.updated = Utc::now();
        }
    }

    fn get_operation(&self, id: Uuid) -> Option<Operation> {
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_move_from_pending_to_done() {
        let ops = Manager::new();
        let id = ops.start_operation("ns1", "sharedstorage_download", None);
        assert_eq!(ops.get_operation(id).unwrap().status, OperationStatus::Pending);
        assert_eq!(ops.pending(), 1);

        ops.complete_operation(id, Err("gateway timeout".into()));
        assert_eq!(
            ops.get_operation(id).unwrap().status,
            OperationStatus::Failed("gateway timeout".into())
        );
        assert_eq!(ops.pending(), 0);
    }
}
