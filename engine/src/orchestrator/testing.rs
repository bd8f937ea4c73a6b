//! In-process plugin doubles for orchestrator tests

use crate::plugins::Factories;
use async_trait::async_trait;
use chrono::Utc;
use sdk::config::ConfigHandle;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::metrics::Metrics;
use sdk::plugins::{
    blockchain, database, dataexchange, identity, sharedstorage, tokens, PluginContext,
};
use sdk::types::{Identity, IdentityFilter, IdentityType, Namespace, SYSTEM_NAMESPACE};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One of every category, all served by the doubles below.
pub const FULL_CONFIG: &str = r#"
[[plugins.database]]
name = "db0"
type = "memory"

[[plugins.blockchain]]
name = "chain0"
type = "fake"

[[plugins.sharedstorage]]
name = "ss0"
type = "fake"

[[plugins.dataexchange]]
name = "dx0"
type = "fake"

[[plugins.tokens]]
name = "tok0"
type = "fake"
"#;

/// Shared journal. Successful inits are recorded as
/// `init:<category>:<instance>`, starts as `<category>:<instance>`.
pub type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: String) {
    log.lock().unwrap().push(entry);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    FailStart,
    /// `init` never completes on its own
    HangInit,
    /// `init` of the named instance fails
    FailInit(&'static str),
}

/// Shared `init` handling of every double: fail or hang as told, otherwise
/// journal the instance.
async fn init_step(
    log: &Log,
    behavior: Behavior,
    category: &str,
    ctx: &PluginContext,
) -> Result<(), CoreError> {
    match behavior {
        Behavior::HangInit => std::future::pending::<()>().await,
        Behavior::FailInit(name) if name == ctx.name => {
            return Err(CoreError::plugin(ctx.name.as_str(), "init refused"));
        }
        _ => {}
    }
    record(log, format!("init:{}:{}", category, ctx.name));
    Ok(())
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<Mutex<HashMap<String, Namespace>>>,
    nodes: Arc<Mutex<Vec<Identity>>>,
}

impl MemoryStore {
    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.namespaces.lock().unwrap().get(name).cloned()
    }

    pub fn add_node(&self, name: &str) {
        self.nodes.lock().unwrap().push(Identity {
            id: Uuid::new_v4(),
            did: format!("did:firefly:node/{}", name),
            identity_type: IdentityType::Node,
            namespace: SYSTEM_NAMESPACE.to_string(),
            name: name.to_string(),
            parent: None,
            profile: json!({ "id": name, "endpoint": format!("https://{}.example", name) }),
            created: Utc::now(),
        });
    }
}

struct MemoryDb {
    store: MemoryStore,
    log: Log,
    behavior: Behavior,
}

#[async_trait]
impl database::Plugin for MemoryDb {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&mut self, ctx: &PluginContext, _config: &ConfigHandle) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "database", ctx).await
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        Ok(self.store.namespace(name))
    }

    async fn upsert_namespace(&self, ns: &Namespace, _allow_existing: bool) -> Result<(), CoreError> {
        self.store
            .namespaces
            .lock()
            .unwrap()
            .insert(ns.name.clone(), ns.clone());
        Ok(())
    }

    async fn get_identities(&self, filter: &IdentityFilter) -> Result<(Vec<Identity>, bool), CoreError> {
        let nodes = self
            .store
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.identity_type.map_or(true, |t| t == i.identity_type))
            .cloned()
            .collect();
        Ok((nodes, false))
    }
}

struct FakeChain {
    log: Log,
    behavior: Behavior,
    instance: String,
}

#[async_trait]
impl blockchain::Plugin for FakeChain {
    fn name(&self) -> &str {
        "fake"
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        _config: &ConfigHandle,
        _metrics: Arc<dyn Metrics>,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "blockchain", ctx).await?;
        self.instance = ctx.name.clone();
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        if self.behavior == Behavior::FailStart {
            return Err(CoreError::plugin("fake", "connector unavailable"));
        }
        record(&self.log, format!("blockchain:{}", self.instance));
        Ok(())
    }

    async fn wait_stop(&self) {}

    async fn verify_identity_syntax(&self, _namespace: &str, key: &str) -> Result<String, CoreError> {
        Ok(key.to_lowercase())
    }
}

struct FakeIdentity {
    log: Log,
    behavior: Behavior,
}

#[async_trait]
impl identity::Plugin for FakeIdentity {
    fn name(&self) -> &str {
        "onchain"
    }

    async fn init(&mut self, ctx: &PluginContext, _config: &ConfigHandle) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "identity", ctx).await
    }

    fn bind_blockchain(&self, _blockchain: Arc<dyn blockchain::Plugin>) {}

    async fn resolve_signing_key(&self, _namespace: &str, key: &str) -> Result<String, CoreError> {
        Ok(key.to_lowercase())
    }
}

struct FakeStorage {
    log: Log,
    behavior: Behavior,
}

#[async_trait]
impl sharedstorage::Plugin for FakeStorage {
    fn name(&self) -> &str {
        "fake"
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        _config: &ConfigHandle,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "sharedstorage", ctx).await
    }

    async fn upload(&self, data: Vec<u8>) -> Result<String, CoreError> {
        Ok(format!("ref-{}", data.len()))
    }

    async fn download(&self, _payload_ref: &str) -> Result<Vec<u8>, CoreError> {
        Ok(b"{}".to_vec())
    }
}

struct FakeDx {
    log: Log,
    behavior: Behavior,
}

#[async_trait]
impl dataexchange::Plugin for FakeDx {
    fn name(&self) -> &str {
        "fake"
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        _config: &ConfigHandle,
        nodes: Vec<serde_json::Value>,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "dataexchange", ctx).await?;
        record(&self.log, format!("nodes:{}:{}", ctx.name, nodes.len()));
        Ok(())
    }

    async fn endpoint_info(&self) -> Result<serde_json::Value, CoreError> {
        Ok(json!({ "id": "local" }))
    }

    async fn send_message(&self, _peer: &str, _payload: Vec<u8>) -> Result<String, CoreError> {
        Ok(Uuid::new_v4().to_string())
    }
}

struct FakeTokens {
    log: Log,
    behavior: Behavior,
    instance: String,
}

#[async_trait]
impl tokens::Plugin for FakeTokens {
    fn name(&self) -> &str {
        "fake"
    }

    async fn init(
        &mut self,
        ctx: &PluginContext,
        _config: &ConfigHandle,
        _callbacks: Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        init_step(&self.log, self.behavior, "tokens", ctx).await?;
        self.instance = ctx.name.clone();
        Ok(())
    }

    async fn start(&self) -> Result<(), CoreError> {
        record(&self.log, format!("tokens:{}", self.instance));
        Ok(())
    }

    async fn wait_stop(&self) {}
}

/// Built-in factories plus a `memory` database and `fake` types for every
/// other category. `onchain` and `ffdx` are replaced by doubles so the
/// synthesized identity and data exchange instances journal their init too.
pub fn factories(log: &Log, store: &MemoryStore, behavior: Behavior) -> Factories {
    let mut factories = Factories::builtin();

    let (db_store, db_log) = (store.clone(), Arc::clone(log));
    factories.database.register("memory", move || {
        Box::new(MemoryDb {
            store: db_store.clone(),
            log: Arc::clone(&db_log),
            behavior,
        })
    });

    let identity_log = Arc::clone(log);
    factories.identity.register("onchain", move || {
        Box::new(FakeIdentity {
            log: Arc::clone(&identity_log),
            behavior,
        })
    });

    let chain_log = Arc::clone(log);
    factories.blockchain.register("fake", move || {
        Box::new(FakeChain {
            log: Arc::clone(&chain_log),
            behavior,
            instance: String::new(),
        })
    });

    let storage_log = Arc::clone(log);
    factories.shared_storage.register("fake", move || {
        Box::new(FakeStorage {
            log: Arc::clone(&storage_log),
            behavior,
        })
    });

    let (dx_log, ffdx_log) = (Arc::clone(log), Arc::clone(log));
    factories
        .data_exchange
        .register("fake", move || {
            Box::new(FakeDx {
                log: Arc::clone(&dx_log),
                behavior,
            })
        })
        .register("ffdx", move || {
            Box::new(FakeDx {
                log: Arc::clone(&ffdx_log),
                behavior,
            })
        });

    let tokens_log = Arc::clone(log);
    factories.tokens.register("fake", move || {
        Box::new(FakeTokens {
            log: Arc::clone(&tokens_log),
            behavior,
            instance: String::new(),
        })
    });

    factories
}
