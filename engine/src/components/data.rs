//! Namespace-aware data access for the messaging managers

use super::Component;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::plugins::database;
use sdk::types::Namespace;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait DataManager: Component {
    /// Looks a namespace up, caching hits for the life of the node.
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError>;

    /// Like [`DataManager::get_namespace`] but absent is an error.
    async fn require_namespace(&self, name: &str) -> Result<Namespace, CoreError> {
        self.get_namespace(name)
            .await?
            .ok_or_else(|| CoreError::Database(format!("namespace '{}' not found", name)))
    }
}

pub struct Manager {
    database: Arc<dyn database::Plugin>,
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl Manager {
    pub fn new(database: Arc<dyn database::Plugin>) -> Arc<Self> {
        Arc::new(Self {
            database,
            namespaces: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "data"
    }

    async fn wait_stop(&self) {
        self.namespaces.write().await.clear();
    }
}

#[async_trait]
impl DataManager for Manager {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        if let Some(ns) = self.namespaces.read().await.get(name) {
            return Ok(Some(ns.clone()));
        }
        let found = self.database.get_namespace(name).await?;
        if let Some(ns) = &found {
            self.namespaces
                .write()
                .await
                .insert(name.to_string(), ns.clone());
        }
        Ok(found)
    }
}
