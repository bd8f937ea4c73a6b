//! HTTPS data exchange connector
//!
//! Talks to a data exchange service at `url`. The service keeps the TLS
//! peer set; the node hands it the profiles of every registered node at
//! init so a restarted connector can rebuild its peer list.

use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::plugins::{dataexchange, PluginContext};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const PLUGIN_TYPE: &str = "ffdx";

struct Endpoint {
    client: reqwest::Client,
    url: String,
    peers: Vec<Value>,
}

#[derive(Default)]
pub struct Ffdx {
    endpoint: Option<Endpoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    request_id: String,
}

impl Ffdx {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoint(&self) -> Result<&Endpoint, CoreError> {
        self.endpoint
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("use ffdx plugin", "uninitialized"))
    }

    /// Node profiles supplied at init.
    pub fn peers(&self) -> &[Value] {
        self.endpoint.as_ref().map(|e| e.peers.as_slice()).unwrap_or(&[])
    }
}

#[async_trait]
impl dataexchange::Plugin for Ffdx {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        nodes: Vec<Value>,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let url = config.require_string("url", PLUGIN_TYPE)?;
        info!(plugin = %ctx.name, url = %url, peers = nodes.len(), "Data exchange configured");
        self.endpoint = Some(Endpoint {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            peers: nodes,
        });
        Ok(())
    }

    async fn endpoint_info(&self) -> Result<Value, CoreError> {
        let ep = self.endpoint()?;
        ep.client
            .get(format!("{}/api/v1/id", ep.url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?
            .json()
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))
    }

    async fn send_message(&self, peer: &str, payload: Vec<u8>) -> Result<String, CoreError> {
        let ep = self.endpoint()?;
        let body = json!({
            "recipient": peer,
            "message": String::from_utf8_lossy(&payload),
        });
        let sent: SendResponse = ep
            .client
            .post(format!("{}/api/v1/messages", ep.url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?
            .json()
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        Ok(sent.request_id)
    }
}
