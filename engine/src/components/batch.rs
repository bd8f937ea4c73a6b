//! Message batching
//!
//! Messages are queued per `(namespace, kind)` and handed to the dispatcher
//! registered for their kind once the batch is full or the batch timeout
//! elapses. Broadcast and private messaging register themselves as
//! dispatchers when they are constructed.

use super::{Component, DataManager, TxHelper};
use crate::worker::Worker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::CoreError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BROADCAST: &str = "broadcast";
pub const PRIVATE: &str = "private";

const QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMessage {
    pub namespace: String,
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub tx: Uuid,
    pub namespace: String,
    pub kind: String,
    pub messages: Vec<BatchMessage>,
    pub created: DateTime<Utc>,
}

#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch_batch(&self, batch: Batch) -> Result<(), CoreError>;
}

#[async_trait]
pub trait BatchManager: Component {
    /// Routes batches of `kind` to `dispatcher`. Only a weak reference is
    /// kept; the dispatcher is owned by its component slot.
    fn register_dispatcher(&self, kind: &str, dispatcher: Arc<dyn BatchDispatcher>);

    async fn new_message(&self, message: BatchMessage) -> Result<(), CoreError>;
}

struct Inner {
    data: Arc<dyn DataManager>,
    tx_helper: Arc<dyn TxHelper>,
    dispatchers: RwLock<HashMap<String, Weak<dyn BatchDispatcher>>>,
    size: usize,
    timeout: Duration,
}

pub struct Manager {
    inner: Arc<Inner>,
    sender: mpsc::Sender<BatchMessage>,
    receiver: Mutex<Option<mpsc::Receiver<BatchMessage>>>,
    worker: Worker,
}

impl Manager {
    pub fn new(
        cancel: CancellationToken,
        data: Arc<dyn DataManager>,
        tx_helper: Arc<dyn TxHelper>,
        size: usize,
        timeout: Duration,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Arc::new(Self {
            inner: Arc::new(Inner {
                data,
                tx_helper,
                dispatchers: RwLock::new(HashMap::new()),
                size: size.max(1),
                timeout,
            }),
            sender,
            receiver: Mutex::new(Some(receiver)),
            worker: Worker::new("batch", cancel),
        })
    }
}

impl Inner {
    fn dispatcher(&self, kind: &str) -> Option<Arc<dyn BatchDispatcher>> {
        self.dispatchers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(kind)
            .and_then(Weak::upgrade)
    }

    async fn flush(&self, namespace: String, kind: String, messages: Vec<BatchMessage>) {
        let Some(dispatcher) = self.dispatcher(&kind) else {
            warn!(kind = %kind, dropped = messages.len(), "No dispatcher for batch kind");
            return;
        };
        let tx = match self.tx_helper.submit_new_transaction(&namespace, "batch_pin").await {
            Ok(tx) => tx,
            Err(e) => {
                warn!(namespace = %namespace, "Failed to allocate batch transaction: {}", e);
                return;
            }
        };
        let batch = Batch {
            id: Uuid::new_v4(),
            tx,
            namespace,
            kind,
            messages,
            created: Utc::now(),
        };
        let (id, count) = (batch.id, batch.messages.len());
        match dispatcher.dispatch_batch(batch).await {
            Ok(()) => debug!(batch = %id, messages = count, "Batch dispatched"),
            Err(e) => warn!(batch = %id, "Batch dispatch failed: {}", e),
        }
    }

    async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<BatchMessage>, cancel: CancellationToken) {
        let mut pending: HashMap<(String, String), Vec<BatchMessage>> = HashMap::new();
        let mut ticker = tokio::time::interval(self.timeout);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = receiver.recv() => {
                    let Some(msg) = msg else { break };
                    let key = (msg.namespace.clone(), msg.kind.clone());
                    let queue = pending.entry(key.clone()).or_default();
                    queue.push(msg);
                    if queue.len() >= self.size {
                        let messages = pending.remove(&key).unwrap_or_default();
                        self.flush(key.0, key.1, messages).await;
                    }
                }
                _ = ticker.tick() => {
                    for ((namespace, kind), messages) in pending.drain() {
                        self.flush(namespace, kind, messages).await;
                    }
                }
            }
        }
        if !pending.is_empty() {
            info!(batches = pending.len(), "Batch manager stopped with unflushed messages");
        }
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "batch"
    }

    async fn start(&self) -> Result<(), CoreError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| CoreError::invalid_state("start batch manager", "started"))?;
        let cancel = self.worker.cancel_token().clone();
        self.worker
            .spawn(Arc::clone(&self.inner).run(receiver, cancel));
        Ok(())
    }

    async fn wait_stop(&self) {
        self.worker.wait_stop().await;
    }
}

#[async_trait]
impl BatchManager for Manager {
    fn register_dispatcher(&self, kind: &str, dispatcher: Arc<dyn BatchDispatcher>) {
        self.inner
            .dispatchers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind.to_string(), Arc::downgrade(&dispatcher));
    }

    async fn new_message(&self, message: BatchMessage) -> Result<(), CoreError> {
        self.inner.data.require_namespace(&message.namespace).await?;
        self.sender
            .send(message)
            .await
            .map_err(|_| CoreError::invalid_state("queue message", "stopped"))
    }
}
