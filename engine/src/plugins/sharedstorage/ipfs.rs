//! IPFS shared storage
//!
//! Uploads go to the IPFS HTTP API (`api.url`), downloads come from the
//! gateway (`gateway.url`, defaulting to the API url).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::plugins::{sharedstorage, PluginContext};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const PLUGIN_TYPE: &str = "ipfs";

struct Endpoints {
    client: reqwest::Client,
    api_url: String,
    gateway_url: String,
}

#[derive(Default)]
pub struct Ipfs {
    endpoints: Option<Endpoints>,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl Ipfs {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoints(&self) -> Result<&Endpoints, CoreError> {
        self.endpoints
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("use ipfs plugin", "uninitialized"))
    }
}

#[async_trait]
impl sharedstorage::Plugin for Ipfs {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let api_url = config.require_string("api.url", PLUGIN_TYPE)?;
        let gateway_url = config
            .get_string("gateway.url")
            .unwrap_or_else(|| api_url.clone());

        info!(plugin = %ctx.name, api = %api_url, gateway = %gateway_url, "IPFS configured");

        self.endpoints = Some(Endpoints {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        });
        Ok(())
    }

    async fn upload(&self, data: Vec<u8>) -> Result<String, CoreError> {
        let ep = self.endpoints()?;
        let form = Form::new().part("file", Part::bytes(data).file_name("payload"));
        let response = ep
            .client
            .post(format!("{}/api/v0/add", ep.api_url))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        debug!(payload_ref = %added.hash, "Uploaded payload to IPFS");
        Ok(added.hash)
    }

    async fn download(&self, payload_ref: &str) -> Result<Vec<u8>, CoreError> {
        let ep = self.endpoints()?;
        let bytes = ep
            .client
            .get(format!("{}/ipfs/{}", ep.gateway_url, payload_ref))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?
            .bytes()
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        Ok(bytes.to_vec())
    }
}
