//! Background task ownership shared by plugins and components
//!
//! A [`Worker`] owns the tasks a plugin or component spawns in `start` and
//! joins them in `wait_stop`. Tasks are expected to exit once the worker's
//! cancellation token fires; `wait_stop` does not cancel on its own.

use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Worker {
    name: String,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            cancel,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    /// Number of tasks spawned and not yet joined.
    pub fn active(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Joins every spawned task. Safe to call more than once.
    pub async fn wait_stop(&self) {
        let handles = std::mem::take(
            &mut *self
                .handles
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(worker = %self.name, "Background task ended abnormally: {}", e);
            }
        }
        debug!(worker = %self.name, "Stopped");
    }
}
