//! Connector event streams
//!
//! Blockchain and token connectors push events to the node over a
//! websocket. The node connects outward as a client and keeps the
//! connection alive:
//!
//! - auto-reconnect with a configurable delay
//! - connector-specific subscribe and acknowledge frames
//! - every received event is handed to the plugin callbacks
//!
//! The loop exits as soon as the cancellation token fires.

use futures::stream::StreamExt;
use futures::SinkExt;
use sdk::config::ConfigHandle;
use sdk::events::{Callbacks, PluginEvent};
use sdk::metrics::Metrics;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Wire conventions of the connector on the other end.
#[derive(Debug, Clone, PartialEq)]
pub enum Protocol {
    /// Ethconnect and fabconnect: `listen` on connect, `ack` per batch.
    Topic { topic: String },
    /// Token connectors: every event carries an id that is acked on its own.
    Tokens,
}

pub struct EventStream {
    pub category: &'static str,
    pub plugin: String,
    pub url: String,
    pub protocol: Protocol,
    pub reconnect_delay: Duration,
    pub callbacks: Arc<dyn Callbacks>,
    pub metrics: Option<Arc<dyn Metrics>>,
}

/// Derives a websocket url from a connector's HTTP url.
pub fn ws_url_from_http(http_url: &str, path: &str) -> String {
    let base = http_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}{}", base, path)
}

/// Reads `<prefix>ws.reconnect_delay_ms` from a plugin's config.
pub fn reconnect_delay(config: &ConfigHandle, prefix: &str) -> Duration {
    let ms = config
        .get_i64(&format!("{}ws.reconnect_delay_ms", prefix))
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
    Duration::from_millis(ms)
}

/// Event kind taken from the first field connectors use to name events.
fn event_kind(event: &Value) -> String {
    ["signature", "eventName", "event", "type"]
        .iter()
        .find_map(|key| event.get(*key).and_then(Value::as_str))
        .unwrap_or("event")
        .to_string()
}

impl EventStream {
    /// Runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            info!(plugin = %self.plugin, "Event stream connecting to {}", self.url);

            tokio::select! {
                _ = cancel.cancelled() => return,
                connected = tokio_tungstenite::connect_async(self.url.as_str()) => match connected {
                    Ok((ws_stream, _response)) => {
                        info!(plugin = %self.plugin, "Event stream connected to {}", self.url);
                        if self.session(ws_stream, &cancel).await {
                            return;
                        }
                    }
                    Err(e) => {
                        error!(plugin = %self.plugin, "Event stream failed to connect: {}", e);
                    }
                },
            }

            debug!(
                plugin = %self.plugin,
                "Event stream reconnecting in {}ms",
                self.reconnect_delay.as_millis()
            );
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Serves one connection. Returns true when the stream should not be
    /// redialled.
    async fn session(&self, ws_stream: WsStream, cancel: &CancellationToken) -> bool {
        let (mut write, mut read) = ws_stream.split();

        if let Protocol::Topic { topic } = &self.protocol {
            let listen = json!({ "type": "listen", "topic": topic });
            if let Err(e) = write.send(WsMessage::Text(listen.to_string())).await {
                warn!(plugin = %self.plugin, "Failed to send listen: {}", e);
                return false;
            }
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return true;
                }
                msg = read.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        for ack in self.handle_frame(&text).await {
                            if let Err(e) = write.send(WsMessage::Text(ack.to_string())).await {
                                warn!(plugin = %self.plugin, "Failed to send ack: {}", e);
                                return false;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(plugin = %self.plugin, "Event stream closed by connector");
                        return false;
                    }
                    Some(Err(e)) => {
                        warn!(plugin = %self.plugin, "Event stream read error: {}", e);
                        return false;
                    }
                    _ => {}
                },
            }
        }
    }

    /// Delivers the events in one text frame and returns the acks to send.
    ///
    /// Topic streams ack the whole batch, so nothing is acked unless every
    /// event was delivered. Token streams ack each delivered event by id and
    /// stop at the first failure; the rest are redelivered by the connector.
    async fn handle_frame(&self, text: &str) -> Vec<Value> {
        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(plugin = %self.plugin, "Failed to parse event frame: {}", e);
                return Vec::new();
            }
        };

        let events = match frame {
            Value::Array(events) => events,
            other => vec![other],
        };

        let mut acks = Vec::new();
        for event in events {
            let kind = event_kind(&event);
            let id = event.get("id").cloned();
            if let Some(metrics) = &self.metrics {
                metrics.increment(&format!("{}_events_received", self.category));
            }
            let delivered = self
                .callbacks
                .deliver(PluginEvent::new(self.category, self.plugin.as_str(), kind, event))
                .await;
            if let Err(e) = delivered {
                warn!(plugin = %self.plugin, "Event delivery failed: {}", e);
                return match self.protocol {
                    Protocol::Topic { .. } => Vec::new(),
                    Protocol::Tokens => acks,
                };
            }
            if let (Protocol::Tokens, Some(id)) = (&self.protocol, id) {
                acks.push(json!({ "event": "ack", "data": { "id": id } }));
            }
        }

        if let Protocol::Topic { topic } = &self.protocol {
            acks.push(json!({ "type": "ack", "topic": topic }));
        }
        acks
    }
}
