//! Aggregation of plugin events
//!
//! Plugins deliver through the bound callbacks into a bounded queue; a
//! single task drains it in order. Batch pins with a payload reference
//! trigger a shared storage download, and downloaded broadcast batches have
//! their definitions applied.
//!
//! Download requests go through a separate handoff task. Shared download
//! workers report back into the event queue, so the draining task itself
//! must never wait on the download queue.

use super::adminevents::AdminEvent;
use super::definitions::DefinitionOutcome;
use super::{AdminEvents, Component, DefinitionHandler, MetricsManager, SharedDownloadManager};
use crate::worker::Worker;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::events::PluginEvent;
use sdk::types::SYSTEM_NAMESPACE;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const QUEUE_CAPACITY: usize = 1000;

/// Event kind a blockchain connector uses for pinned batches.
pub const BATCH_PIN: &str = "BatchPin";

/// Event kind carrying a definition inline.
pub const DEFINITION: &str = "definition";

#[async_trait]
pub trait EventManager: Component {
    /// Queues an event received from a plugin.
    async fn plugin_event(&self, event: PluginEvent) -> Result<(), CoreError>;

    /// Called by shared download once a payload has been fetched.
    async fn shared_storage_downloaded(
        &self,
        namespace: &str,
        payload_ref: &str,
        data: Vec<u8>,
    ) -> Result<(), CoreError>;
}

#[derive(Debug)]
enum Work {
    Plugin(PluginEvent),
    Downloaded {
        namespace: String,
        payload_ref: String,
        data: Vec<u8>,
    },
}

/// Namespace and payload reference of a pinned batch to fetch.
type DownloadRequest = (String, String);

struct Inner {
    definitions: Arc<dyn DefinitionHandler>,
    download_requests: mpsc::UnboundedSender<DownloadRequest>,
    shared_download: Arc<dyn SharedDownloadManager>,
    metrics: Arc<dyn MetricsManager>,
    admin_events: Option<Arc<dyn AdminEvents>>,
}

pub struct Manager {
    inner: Arc<Inner>,
    sender: mpsc::Sender<Work>,
    receiver: Mutex<Option<mpsc::Receiver<Work>>>,
    download_receiver: Mutex<Option<mpsc::UnboundedReceiver<DownloadRequest>>>,
    worker: Worker,
}

impl Manager {
    pub fn new(
        cancel: CancellationToken,
        definitions: Arc<dyn DefinitionHandler>,
        shared_download: Arc<dyn SharedDownloadManager>,
        metrics: Arc<dyn MetricsManager>,
        admin_events: Option<Arc<dyn AdminEvents>>,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let (download_requests, download_receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            inner: Arc::new(Inner {
                definitions,
                download_requests,
                shared_download,
                metrics,
                admin_events,
            }),
            sender,
            receiver: Mutex::new(Some(receiver)),
            download_receiver: Mutex::new(Some(download_receiver)),
            worker: Worker::new("events", cancel),
        })
    }

    async fn enqueue(&self, work: Work) -> Result<(), CoreError> {
        tokio::select! {
            _ = self.worker.cancel_token().cancelled() => Err(CoreError::Cancelled),
            sent = self.sender.send(work) => {
                sent.map_err(|_| CoreError::invalid_state("queue event", "stopped"))
            }
        }
    }
}

fn event_namespace(payload: &Value) -> &str {
    payload
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or(SYSTEM_NAMESPACE)
}

impl Inner {
    fn publish(&self, kind: &str, payload: Value) {
        if let Some(admin) = &self.admin_events {
            admin.publish(AdminEvent {
                kind: kind.to_string(),
                payload,
            });
        }
    }

    async fn apply_definition(&self, namespace: &str, definition: &Value) -> Result<(), CoreError> {
        if self.definitions.handle_definition(namespace, definition).await?
            == DefinitionOutcome::Applied
        {
            self.metrics.increment("definitions_applied");
            self.publish("definition_applied", definition.clone());
        }
        Ok(())
    }

    async fn handle_plugin_event(&self, event: PluginEvent) -> Result<(), CoreError> {
        self.metrics.increment(&format!("events_{}", event.category));
        let namespace = event_namespace(&event.payload);
        match event.kind.as_str() {
            DEFINITION => {
                let definition = event.payload.get("definition").unwrap_or(&event.payload);
                self.apply_definition(namespace, definition).await?;
            }
            BATCH_PIN => match event.payload.get("payloadRef").and_then(Value::as_str) {
                Some(payload_ref) if !payload_ref.is_empty() => {
                    self.download_requests
                        .send((namespace.to_string(), payload_ref.to_string()))
                        .map_err(|_| CoreError::invalid_state("request download", "stopped"))?;
                }
                _ => debug!(plugin = %event.plugin, "Batch pin without payload reference"),
            },
            other => debug!(plugin = %event.plugin, kind = other, "Event recorded"),
        }
        self.publish(
            "plugin_event",
            json!({ "category": event.category, "plugin": event.plugin, "kind": event.kind }),
        );
        Ok(())
    }

    async fn handle_download(
        &self,
        namespace: &str,
        payload_ref: &str,
        data: &[u8],
    ) -> Result<(), CoreError> {
        self.metrics.increment("batches_received");
        let batch: Value = serde_json::from_slice(data)
            .map_err(|e| CoreError::plugin("sharedstorage", format!("batch {}: {}", payload_ref, e)))?;
        let messages = batch
            .get("messages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for message in messages {
            if let Some(definition) = message.get("payload").and_then(|p| p.get("definition")) {
                let namespace = message
                    .get("namespace")
                    .and_then(Value::as_str)
                    .unwrap_or(namespace);
                self.apply_definition(namespace, definition).await?;
            }
        }
        Ok(())
    }

    /// Feeds download requests to shared download, one at a time.
    async fn forward_downloads(
        self: Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<DownloadRequest>,
        cancel: CancellationToken,
    ) {
        loop {
            let (namespace, payload_ref) = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            let initiated = tokio::select! {
                _ = cancel.cancelled() => break,
                initiated = self.shared_download.initiate_download(&namespace, &payload_ref) => initiated,
            };
            match initiated {
                Ok(op) => debug!(op = %op, payload_ref = %payload_ref, "Batch payload download queued"),
                Err(e) => warn!(payload_ref = %payload_ref, "Batch payload download not queued: {}", e),
            }
        }
    }

    async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<Work>, cancel: CancellationToken) {
        loop {
            let work = tokio::select! {
                _ = cancel.cancelled() => break,
                work = receiver.recv() => work,
            };
            let result = match work {
                Some(Work::Plugin(event)) => self.handle_plugin_event(event).await,
                Some(Work::Downloaded {
                    namespace,
                    payload_ref,
                    data,
                }) => self.handle_download(&namespace, &payload_ref, &data).await,
                None => break,
            };
            if let Err(e) = result {
                warn!("Event processing failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn start(&self) -> Result<(), CoreError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| CoreError::invalid_state("start event manager", "started"))?;
        let downloads = self
            .download_receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| CoreError::invalid_state("start event manager", "started"))?;
        let cancel = self.worker.cancel_token();
        self.worker
            .spawn(Arc::clone(&self.inner).run(receiver, cancel.clone()));
        self.worker
            .spawn(Arc::clone(&self.inner).forward_downloads(downloads, cancel.clone()));
        info!("Event manager started");
        Ok(())
    }

    async fn wait_stop(&self) {
        self.worker.wait_stop().await;
    }
}

#[async_trait]
impl EventManager for Manager {
    async fn plugin_event(&self, event: PluginEvent) -> Result<(), CoreError> {
        self.enqueue(Work::Plugin(event)).await
    }

    async fn shared_storage_downloaded(
        &self,
        namespace: &str,
        payload_ref: &str,
        data: Vec<u8>,
    ) -> Result<(), CoreError> {
        self.enqueue(Work::Downloaded {
            namespace: namespace.to_string(),
            payload_ref: payload_ref.to_string(),
            data,
        })
        .await
    }
}
