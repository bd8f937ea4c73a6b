//! Hyperledger Fabric via a fabconnect-style connector
//!
//! Keys: `fabconnect.url` (required), `fabconnect.channel`,
//! `fabconnect.topic`, `fabconnect.ws.url`, `fabconnect.ws.reconnect_delay_ms`.

use crate::plugins::eventstream::{self, EventStream, Protocol};
use crate::worker::Worker;
use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::metrics::Metrics;
use sdk::plugins::{blockchain, PluginContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PLUGIN_TYPE: &str = "fabric";

struct Connection {
    instance: String,
    ws_url: String,
    topic: String,
    reconnect_delay: Duration,
    metrics: Arc<dyn Metrics>,
    callbacks: Arc<dyn Callbacks>,
    worker: Worker,
}

#[derive(Default)]
pub struct Fabric {
    conn: Option<Connection>,
}

impl Fabric {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl blockchain::Plugin for Fabric {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        metrics: Arc<dyn Metrics>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let url = config.require_string("fabconnect.url", PLUGIN_TYPE)?;
        let channel = config
            .get_string("fabconnect.channel")
            .unwrap_or_else(|| "default-channel".to_string());
        let ws_url = config
            .get_string("fabconnect.ws.url")
            .unwrap_or_else(|| eventstream::ws_url_from_http(&url, "/ws"));
        let topic = config
            .get_string("fabconnect.topic")
            .unwrap_or_else(|| ctx.name.clone());

        info!(plugin = %ctx.name, url = %url, channel = %channel, "Fabric connector configured");

        self.conn = Some(Connection {
            instance: ctx.name.clone(),
            ws_url,
            topic,
            reconnect_delay: eventstream::reconnect_delay(config, "fabconnect."),
            metrics,
            callbacks,
            worker: Worker::new(ctx.name.clone(), ctx.cancel.clone()),
        });
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("start fabric plugin", "uninitialized"))?;
        let stream = EventStream {
            category: "blockchain",
            plugin: conn.instance.clone(),
            url: conn.ws_url.clone(),
            protocol: Protocol::Topic {
                topic: conn.topic.clone(),
            },
            reconnect_delay: conn.reconnect_delay,
            callbacks: Arc::clone(&conn.callbacks),
            metrics: Some(Arc::clone(&conn.metrics)),
        };
        conn.worker
            .spawn(stream.run(conn.worker.cancel_token().clone()));
        Ok(())
    }

    async fn wait_stop(&self) {
        if let Some(conn) = &self.conn {
            conn.worker.wait_stop().await;
        }
    }

    /// Fabric signers are MSP identities written `<msp>::<id>` or a bare
    /// enrollment id.
    async fn verify_identity_syntax(&self, _namespace: &str, key: &str) -> Result<String, CoreError> {
        let key = key.trim();
        let valid = !key.is_empty()
            && !key.chars().any(char::is_whitespace)
            && key.split("::").all(|part| !part.is_empty());
        if valid {
            Ok(key.to_string())
        } else {
            Err(CoreError::InvalidIdentityKey {
                plugin: PLUGIN_TYPE.to_string(),
                key: key.to_string(),
            })
        }
    }
}
