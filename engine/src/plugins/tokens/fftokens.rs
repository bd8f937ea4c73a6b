//! Token connector speaking the fftokens REST + websocket protocol
//!
//! Keys: `url` (required), `ws.url` (defaults to `<url>/api/ws`),
//! `ws.reconnect_delay_ms`.

use crate::plugins::eventstream::{self, EventStream, Protocol};
use crate::worker::Worker;
use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::plugins::{tokens, PluginContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PLUGIN_TYPE: &str = "fftokens";

struct Connection {
    instance: String,
    ws_url: String,
    reconnect_delay: Duration,
    callbacks: Arc<dyn Callbacks>,
    worker: Worker,
}

#[derive(Default)]
pub struct FfTokens {
    conn: Option<Connection>,
}

impl FfTokens {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl tokens::Plugin for FfTokens {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let url = config.require_string("url", PLUGIN_TYPE)?;
        let ws_url = config
            .get_string("ws.url")
            .unwrap_or_else(|| eventstream::ws_url_from_http(&url, "/api/ws"));

        info!(plugin = %ctx.name, url = %url, "Token connector configured");

        self.conn = Some(Connection {
            instance: ctx.name.clone(),
            ws_url,
            reconnect_delay: eventstream::reconnect_delay(config, ""),
            callbacks,
            worker: Worker::new(ctx.name.clone(), ctx.cancel.clone()),
        });
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("start fftokens plugin", "uninitialized"))?;
        let stream = EventStream {
            category: "tokens",
            plugin: conn.instance.clone(),
            url: conn.ws_url.clone(),
            protocol: Protocol::Tokens,
            reconnect_delay: conn.reconnect_delay,
            callbacks: Arc::clone(&conn.callbacks),
            metrics: None,
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
}
