//! Application of definitions received in broadcast batches

use super::Component;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::database;
use sdk::types::{validate_name, Namespace, NamespaceType};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionOutcome {
    Applied,
    Ignored,
}

#[async_trait]
pub trait DefinitionHandler: Component {
    async fn handle_definition(
        &self,
        namespace: &str,
        definition: &Value,
    ) -> Result<DefinitionOutcome, CoreError>;
}

pub struct Manager {
    database: Arc<dyn database::Plugin>,
}

impl Manager {
    pub fn new(database: Arc<dyn database::Plugin>) -> Arc<Self> {
        Arc::new(Self { database })
    }

    async fn apply_namespace(&self, definition: &Value) -> Result<DefinitionOutcome, CoreError> {
        let name = definition.get("name").and_then(Value::as_str).unwrap_or_default();
        validate_name("name", name)?;
        if let Some(existing) = self.database.get_namespace(name).await? {
            if existing.ns_type == NamespaceType::Local || existing.ns_type == NamespaceType::System {
                // locally predefined namespaces take precedence
                return Ok(DefinitionOutcome::Ignored);
            }
        }
        let description = definition
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let ns = Namespace::new(name, NamespaceType::Broadcast, description);
        self.database.upsert_namespace(&ns, true).await?;
        info!(namespace = name, "Broadcast namespace defined");
        Ok(DefinitionOutcome::Applied)
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "definitions"
    }
}

#[async_trait]
impl DefinitionHandler for Manager {
    async fn handle_definition(
        &self,
        namespace: &str,
        definition: &Value,
    ) -> Result<DefinitionOutcome, CoreError> {
        match definition.get("type").and_then(Value::as_str) {
            Some("namespace") => self.apply_namespace(definition).await,
            other => {
                debug!(namespace, kind = ?other, "Definition not handled");
                Ok(DefinitionOutcome::Ignored)
            }
        }
    }
}
