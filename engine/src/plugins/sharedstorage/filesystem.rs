//! Local directory shared storage
//!
//! Intended for single-host networks and tests: every member must mount
//! the same `path`. Payloads are stored one file each, named by a fresh
//! uuid which doubles as the payload reference.

use async_trait::async_trait;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::plugins::{sharedstorage, PluginContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const PLUGIN_TYPE: &str = "filesystem";

#[derive(Default)]
pub struct Filesystem {
    root: Option<PathBuf>,
}

impl Filesystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn path_for(&self, payload_ref: &str) -> Result<PathBuf, CoreError> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("use filesystem plugin", "uninitialized"))?;
        let id = Uuid::parse_str(payload_ref).map_err(|_| {
            CoreError::plugin(PLUGIN_TYPE, format!("invalid payload reference '{}'", payload_ref))
        })?;
        Ok(root.join(id.to_string()))
    }
}

#[async_trait]
impl sharedstorage::Plugin for Filesystem {
    fn name(&self) -> &str {
        PLUGIN_TYPE
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        config: &ConfigHandle,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let root = PathBuf::from(config.require_string("path", PLUGIN_TYPE)?);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        info!(plugin = %ctx.name, path = %root.display(), "Filesystem storage ready");
        self.root = Some(root);
        Ok(())
    }

    async fn upload(&self, data: Vec<u8>) -> Result<String, CoreError> {
        let payload_ref = Uuid::new_v4().to_string();
        tokio::fs::write(self.path_for(&payload_ref)?, data)
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))?;
        Ok(payload_ref)
    }

    async fn download(&self, payload_ref: &str) -> Result<Vec<u8>, CoreError> {
        tokio::fs::read(self.path_for(payload_ref)?)
            .await
            .map_err(|e| CoreError::plugin(PLUGIN_TYPE, e))
    }
}
