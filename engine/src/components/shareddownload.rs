//! Background retrieval of payloads from shared storage
//!
//! Downloads are queued and served by a fixed pool of workers. Each finished
//! download is handed to the events manager, which is attached after
//! construction with [`SharedDownloadManager::set_event_sink`].

use super::{Component, EventManager, OperationsManager};
use crate::worker::Worker;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::sharedstorage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 100;

#[async_trait]
pub trait SharedDownloadManager: Component {
    /// Where completed downloads are reported. Held weakly.
    fn set_event_sink(&self, events: Weak<dyn EventManager>);

    /// Queues a download of `payload_ref` and returns its operation id.
    async fn initiate_download(&self, namespace: &str, payload_ref: &str)
        -> Result<Uuid, CoreError>;
}

#[derive(Debug)]
struct Job {
    namespace: String,
    payload_ref: String,
    op: Uuid,
}

struct Inner {
    shared_storage: Arc<dyn sharedstorage::Plugin>,
    operations: Arc<dyn OperationsManager>,
    events: RwLock<Option<Weak<dyn EventManager>>>,
}

pub struct Manager {
    inner: Arc<Inner>,
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    workers: usize,
    started: AtomicBool,
    worker: Worker,
}

impl Manager {
    pub fn new(
        cancel: CancellationToken,
        shared_storage: Arc<dyn sharedstorage::Plugin>,
        operations: Arc<dyn OperationsManager>,
        workers: usize,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Arc::new(Self {
            inner: Arc::new(Inner {
                shared_storage,
                operations,
                events: RwLock::new(None),
            }),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            workers: workers.max(1),
            started: AtomicBool::new(false),
            worker: Worker::new("shareddownload", cancel),
        })
    }
}

impl Inner {
    fn event_sink(&self) -> Option<Arc<dyn EventManager>> {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    async fn process(&self, job: Job, cancel: &CancellationToken) {
        let data = match self.shared_storage.download(&job.payload_ref).await {
            Ok(data) => {
                self.operations.complete_operation(job.op, Ok(()));
                data
            }
            Err(e) => {
                warn!(payload_ref = %job.payload_ref, "Download failed: {}", e);
                self.operations.complete_operation(job.op, Err(e.to_string()));
                return;
            }
        };
        debug!(payload_ref = %job.payload_ref, bytes = data.len(), "Download complete");
        let Some(events) = self.event_sink() else {
            warn!(payload_ref = %job.payload_ref, "No event sink for completed download");
            return;
        };
        // The events queue may be full; never outlive a stop request waiting on it.
        let reported = tokio::select! {
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            reported = events.shared_storage_downloaded(&job.namespace, &job.payload_ref, data) => reported,
        };
        if let Err(e) = reported {
            warn!(payload_ref = %job.payload_ref, "Failed to report download: {}", e);
        }
    }

    async fn run(
        self: Arc<Self>,
        id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
        cancel: CancellationToken,
    ) {
        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => break,
                job = async { receiver.lock().await.recv().await } => job,
            };
            match job {
                Some(job) => self.process(job, &cancel).await,
                None => break,
            }
        }
        debug!(worker = id, "Download worker exited");
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "shareddownload"
    }

    async fn start(&self) -> Result<(), CoreError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::invalid_state("start shared download", "started"));
        }
        for id in 0..self.workers {
            let cancel = self.worker.cancel_token().clone();
            self.worker.spawn(Arc::clone(&self.inner).run(
                id,
                Arc::clone(&self.receiver),
                cancel,
            ));
        }
        info!(
            workers = self.workers,
            storage = self.inner.shared_storage.name(),
            "Shared download started"
        );
        Ok(())
    }

    async fn wait_stop(&self) {
        self.worker.wait_stop().await;
    }
}

#[async_trait]
impl SharedDownloadManager for Manager {
    fn set_event_sink(&self, events: Weak<dyn EventManager>) {
        *self
            .inner
            .events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(events);
    }

    async fn initiate_download(
        &self,
        namespace: &str,
        payload_ref: &str,
    ) -> Result<Uuid, CoreError> {
        let op = self
            .inner
            .operations
            .start_operation(namespace, "sharedstorage_download", None);
        let job = Job {
            namespace: namespace.to_string(),
            payload_ref: payload_ref.to_string(),
            op,
        };
        let queued = tokio::select! {
            _ = self.worker.cancel_token().cancelled() => Err(CoreError::Cancelled),
            sent = self.sender.send(job) => {
                sent.map_err(|_| CoreError::invalid_state("queue download", "stopped"))
            }
        };
        if let Err(e) = queued {
            self.inner.operations.complete_operation(op, Err(e.to_string()));
            return Err(e);
        }
        Ok(op)
    }
}
