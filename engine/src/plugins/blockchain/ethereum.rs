//! Ethereum via an ethconnect-style connector
//!
//! Keys under the plugin scope:
//!
//! - `ethconnect.url` (required): connector REST endpoint
//! - `ethconnect.topic`: event stream topic, defaults to the instance name
//! - `ethconnect.ws.url`: websocket endpoint, derived from `url` when absent
//! - `ethconnect.ws.reconnect_delay_ms`

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

const PLUGIN_TYPE: &str = "ethereum";

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
pub struct Ethereum {
    conn: Option<Connection>,
}

impl Ethereum {
    pub fn new() -> Self {
        Self::default()
    }

    fn conn(&self) -> Result<&Connection, CoreError> {
        self.conn
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("use ethereum plugin", "uninitialized"))
    }
}

/// Canonical form of an ethereum address: `0x` plus 40 lowercase hex digits.
pub fn normalize_address(key: &str) -> Result<String, CoreError> {
    let invalid = || CoreError::InvalidIdentityKey {
        plugin: PLUGIN_TYPE.to_string(),
        key: key.to_string(),
    };
    let digits = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    if bytes.len() != 20 {
        return Err(invalid());
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

#[async_trait]
impl blockchain::Plugin for Ethereum {
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
        let url = config.require_string("ethconnect.url", PLUGIN_TYPE)?;
        let ws_url = config
            .get_string("ethconnect.ws.url")
            .unwrap_or_else(|| eventstream::ws_url_from_http(&url, "/ws"));
        let topic = config
            .get_string("ethconnect.topic")
            .unwrap_or_else(|| ctx.name.clone());

        info!(plugin = %ctx.name, url = %url, topic = %topic, "Ethereum connector configured");

        self.conn = Some(Connection {
            instance: ctx.name.clone(),
            ws_url,
            topic,
            reconnect_delay: eventstream::reconnect_delay(config, "ethconnect."),
            metrics,
            callbacks,
            worker: Worker::new(ctx.name.clone(), ctx.cancel.clone()),
        });
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        let conn = self.conn()?;
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

    async fn verify_identity_syntax(&self, _namespace: &str, key: &str) -> Result<String, CoreError> {
        normalize_address(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_lowercased_with_prefix() {
        assert_eq!(
            normalize_address("0xABCDEFabcdef0123456789ABCDEFabcdef012345").unwrap(),
            "0xabcdefabcdef0123456789abcdefabcdef012345"
        );
        assert_eq!(
            normalize_address("abcdefabcdef0123456789abcdefabcdef012345").unwrap(),
            "0xabcdefabcdef0123456789abcdefabcdef012345"
        );
    }

    #[test]
    fn short_or_non_hex_keys_fail() {
        for key in ["0x1234", "0xZZcdefabcdef0123456789abcdefabcdef012345", ""] {
            let err = normalize_address(key).unwrap_err();
            assert!(err.to_string().starts_with("FF10141"));
        }
    }
}
