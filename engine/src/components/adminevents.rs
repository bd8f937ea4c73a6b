//! Fan-out of node-level change events to admin listeners

use super::Component;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminEvent {
    pub kind: String,
    pub payload: serde_json::Value,
}

pub trait AdminEvents: Component {
    fn subscribe(&self) -> broadcast::Receiver<AdminEvent>;

    /// Publishes to current subscribers. Events with no subscriber are dropped.
    fn publish(&self, event: AdminEvent);
}

pub struct Manager {
    sender: broadcast::Sender<AdminEvent>,
}

impl Manager {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "adminevents"
    }

    async fn wait_stop(&self) {
        debug!(
            subscribers = self.sender.receiver_count(),
            "Admin events stopped"
        );
    }
}

impl AdminEvents for Manager {
    fn subscribe(&self) -> broadcast::Receiver<AdminEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: AdminEvent) {
        let _ = self.sender.send(event);
    }
}
