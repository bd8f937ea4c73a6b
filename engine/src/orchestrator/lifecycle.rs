//! Lifecycle driver: init, start and stop
//!
//! ```text
//! uninitialized -init-> initializing -ok-> ready -start-> starting -ok-> running
//!                                    \-err-> stopped             \-err-> stopping -> stopped
//! running -wait_stop-> stopping -> stopped
//! ```
//!
//! `stopped` is terminal. `wait_stop` may be called from any state and by
//! several callers; only the first does any work.

use super::components::{ensure_metrics, init_components, wire_peers};
use super::namespaces::init_namespaces;
use super::plugins::Plugins;
use super::Orchestrator;
use crate::components::{require, Component};
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initializing,
    Ready,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starts one component, logging it under its own name.
async fn start_component<C: Component + ?Sized>(component: &C) -> Result<(), CoreError> {
    debug!(component = component.name(), "Starting component");
    component.start().await
}

impl Orchestrator {
    /// Initializes plugins, components and namespaces.
    ///
    /// `cancel` becomes the node's root token: every plugin and component
    /// receives a child of it. If it fires while a plugin is initializing,
    /// init returns `Cancelled`.
    ///
    /// On error the root token is cancelled and the orchestrator is left
    /// `stopped`. Nothing has been started at that point, so there is no
    /// background work to join.
    pub async fn init(&mut self, cancel: CancellationToken) -> Result<(), CoreError> {
        let state = self.state();
        if state != State::Uninitialized {
            return Err(CoreError::invalid_state("init", state));
        }
        self.set_state(State::Initializing);
        self.cancel = cancel;

        match self.init_layers().await {
            Ok(()) => {
                self.set_state(State::Ready);
                info!(
                    node = %self.config.node.name,
                    namespaces = self.namespaces.len(),
                    "Node initialized"
                );
                Ok(())
            }
            Err(e) => {
                error!("Node initialization failed: {}", e);
                self.cancel.cancel();
                self.set_state(State::Stopped);
                *self.stopped.get_mut() = true;
                Err(e)
            }
        }
    }

    async fn init_layers(&mut self) -> Result<(), CoreError> {
        // Configs parsed with `Config::from_toml_str` have not been checked yet
        self.config.validate_and_process()?;

        let metrics = ensure_metrics(&mut self.components, &self.config);
        let callbacks: Arc<dyn Callbacks> = Arc::clone(&self.callbacks) as Arc<dyn Callbacks>;
        self.plugins = Plugins::init(
            &self.config,
            &self.factories,
            &self.cancel,
            metrics.as_metrics(),
            callbacks,
        )
        .await?;

        init_components(&mut self.components, &self.plugins, &self.config, &self.cancel).await?;
        wire_peers(&self.components, &self.callbacks)?;

        let database = self.plugins.database().ok_or_else(|| CoreError::NoDatabase {
            component: "namespaces".to_string(),
        })?;
        self.namespaces = init_namespaces(&self.config, database.as_ref()).await?;
        Ok(())
    }

    /// Starts blockchain plugins, then the components and token plugins in
    /// dependency order.
    ///
    /// The first failure is returned unchanged, after the root token has
    /// been cancelled and everything already started has been joined.
    pub async fn start(&self) -> Result<(), CoreError> {
        let state = self.state();
        if state != State::Ready {
            return Err(CoreError::invalid_state("start", state));
        }
        self.set_state(State::Starting);

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            result = self.start_all() => result,
        };

        match result {
            Ok(()) => {
                self.set_state(State::Running);
                info!("Node started");
                Ok(())
            }
            Err(e) => {
                error!("Node start failed: {}", e);
                self.cancel.cancel();
                self.wait_stop().await;
                Err(e)
            }
        }
    }

    async fn start_all(&self) -> Result<(), CoreError> {
        for (name, plugin) in &self.plugins.blockchain {
            debug!(plugin = %name, "Starting blockchain plugin");
            plugin.start().await?;
        }

        let c = &self.components;
        start_component(require(&c.batch, "orchestrator", "batch")?.as_ref()).await?;
        start_component(require(&c.events, "orchestrator", "events")?.as_ref()).await?;
        start_component(require(&c.broadcast, "orchestrator", "broadcast")?.as_ref()).await?;
        start_component(require(&c.messaging, "orchestrator", "messaging")?.as_ref()).await?;
        start_component(require(&c.assets, "orchestrator", "assets")?.as_ref()).await?;

        for (name, plugin) in &self.plugins.tokens {
            debug!(plugin = %name, "Starting tokens plugin");
            plugin.start().await?;
        }

        start_component(require(&c.shared_download, "orchestrator", "shareddownload")?.as_ref())
            .await?;
        start_component(require(&c.operations, "orchestrator", "operations")?.as_ref()).await?;
        start_component(require(&c.metrics, "orchestrator", "metrics")?.as_ref()).await?;
        Ok(())
    }

    /// Cancels the root token and waits for every plugin and component to
    /// finish. Returns immediately once a previous call has completed.
    pub async fn wait_stop(&self) {
        let mut stopped = self.stopped.lock().await;
        if *stopped {
            return;
        }
        self.set_state(State::Stopping);
        self.cancel.cancel();

        let mut stops = self.plugins.stop_futures();
        stops.extend(self.components.stop_futures());
        debug!(tasks = stops.len(), "Waiting for plugins and components to stop");
        futures::future::join_all(stops).await;

        self.set_state(State::Stopped);
        *stopped = true;
        info!("Node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::operations::Operation;
    use crate::components::{MetricsManager, OperationsManager};
    use crate::config::Config;
    use crate::orchestrator::testing::{factories, Behavior, Log, MemoryStore, FULL_CONFIG};
    use async_trait::async_trait;
    use sdk::errors::ErrorExt;
    use sdk::metrics::Metrics;
    use sdk::types::{NamespaceType, SYSTEM_NAMESPACE};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use uuid::Uuid;

    fn build(toml: &str, behavior: Behavior) -> (Orchestrator, Log, MemoryStore) {
        let log = Log::default();
        let store = MemoryStore::default();
        let config = Config::from_toml_str(toml).unwrap();
        let orchestrator = Orchestrator::new(config, factories(&log, &store, behavior));
        (orchestrator, log, store)
    }

    struct RecordingOperations(Log);

    #[async_trait]
    impl Component for RecordingOperations {
        fn name(&self) -> &'static str {
            "operations"
        }

        async fn start(&self) -> Result<(), CoreError> {
            self.0.lock().unwrap().push("operations".into());
            Ok(())
        }
    }

    impl OperationsManager for RecordingOperations {
        fn start_operation(&self, _namespace: &str, _op_type: &str, _tx: Option<Uuid>) -> Uuid {
            Uuid::new_v4()
        }

        fn complete_operation(&self, _id: Uuid, _outcome: Result<(), String>) {}

        fn get_operation(&self, _id: Uuid) -> Option<Operation> {
            None
        }
    }

    struct RecordingMetrics(Log);

    impl Metrics for RecordingMetrics {
        fn is_enabled(&self) -> bool {
            false
        }

        fn increment(&self, _counter: &str) {}
    }

    #[async_trait]
    impl Component for RecordingMetrics {
        fn name(&self) -> &'static str {
            "metrics"
        }

        async fn start(&self) -> Result<(), CoreError> {
            self.0.lock().unwrap().push("metrics".into());
            Ok(())
        }
    }

    impl MetricsManager for RecordingMetrics {
        fn counter(&self, _name: &str) -> u64 {
            0
        }

        fn snapshot(&self) -> BTreeMap<String, u64> {
            BTreeMap::new()
        }

        fn as_metrics(self: Arc<Self>) -> Arc<dyn Metrics> {
            self
        }
    }

    #[tokio::test]
    async fn happy_path_runs_and_stops() {
        let (mut node, _log, store) = build(FULL_CONFIG, Behavior::Normal);
        node.init(CancellationToken::new()).await.unwrap();
        assert_eq!(node.state(), State::Ready);
        assert!(node.broadcast().is_some());
        assert!(node.events().is_some());
        assert!(node.private_messaging().is_some());
        assert!(node.network_map().is_some());
        assert!(node.assets().is_some());
        assert!(node.contracts().is_some());
        assert_eq!(node.plugins().identity[0].0, "identity_0");

        let names: Vec<_> = node.namespaces().iter().map(|ns| ns.name.as_str()).collect();
        assert_eq!(names, [SYSTEM_NAMESPACE, "default"]);
        assert_eq!(
            store.namespace(SYSTEM_NAMESPACE).unwrap().ns_type,
            NamespaceType::System
        );

        node.start().await.unwrap();
        assert_eq!(node.state(), State::Running);

        node.wait_stop().await;
        assert_eq!(node.state(), State::Stopped);
        assert!(node.cancel_token().is_cancelled());
        node.wait_stop().await;
        assert!(node.start().await.is_err());
    }

    #[tokio::test]
    async fn start_follows_dependency_order() {
        let (mut node, log, _store) = build(FULL_CONFIG, Behavior::Normal);
        {
            let slots = node.components_mut().unwrap();
            slots.operations = Some(Arc::new(RecordingOperations(Arc::clone(&log))));
            slots.metrics = Some(Arc::new(RecordingMetrics(Arc::clone(&log))));
        }
        node.init(CancellationToken::new()).await.unwrap();
        assert!(node.components_mut().is_err());
        node.start().await.unwrap();

        let started: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| !entry.starts_with("init:") && !entry.starts_with("nodes:"))
            .cloned()
            .collect();
        assert_eq!(started, ["blockchain:chain0", "tokens:tok0", "operations", "metrics"]);
        node.wait_stop().await;
    }

    fn inits(log: &Log) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with("init:"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn plugins_initialize_in_category_then_declaration_order() {
        let toml = FULL_CONFIG.replacen(
            "[[plugins.blockchain]]",
            "[[plugins.database]]\nname = \"db1\"\ntype = \"memory\"\n\n[[plugins.blockchain]]",
            1,
        );
        let (mut node, log, _) = build(&toml, Behavior::Normal);
        node.init(CancellationToken::new()).await.unwrap();
        assert_eq!(
            inits(&log),
            [
                "init:database:db0",
                "init:database:db1",
                "init:identity:identity_0",
                "init:blockchain:chain0",
                "init:sharedstorage:ss0",
                "init:dataexchange:dx0",
                "init:tokens:tok0",
            ]
        );
        node.wait_stop().await;
    }

    #[tokio::test]
    async fn init_failure_skips_everything_after_it() {
        let toml = FULL_CONFIG.replacen(
            "[[plugins.sharedstorage]]",
            "[[plugins.blockchain]]\nname = \"chain1\"\ntype = \"fake\"\n\n[[plugins.sharedstorage]]",
            1,
        );
        let (mut node, log, _) = build(&toml, Behavior::FailInit("chain0"));
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10901");
        assert!(err.to_string().contains("chain0"));
        assert_eq!(node.state(), State::Stopped);

        // chain1, shared storage, data exchange and tokens never saw init
        assert_eq!(inits(&log), ["init:database:db0", "init:identity:identity_0"]);
        assert!(node.plugins().blockchain.is_empty());
        node.wait_stop().await;
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_batch_timeout_is_rejected_at_init() {
        let toml = format!("[batch]\ntimeout_ms = 0\n{}", FULL_CONFIG);
        let (mut node, log, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10903");
        assert!(err.to_string().contains("batch.timeout_ms"));
        assert_eq!(node.state(), State::Stopped);
        assert!(inits(&log).is_empty());
        assert!(node.start().await.is_err());
    }

    #[tokio::test]
    async fn unknown_database_type_fails_init() {
        let toml = FULL_CONFIG.replacen("type = \"memory\"", "type = \"wrong\"", 1);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "FF10122: Unknown database plugin 'wrong'");
        assert_eq!(node.state(), State::Stopped);
        assert!(node.cancel_token().is_cancelled());
        node.wait_stop().await;
    }

    #[tokio::test]
    async fn invalid_plugin_name_fails_init() {
        let toml = FULL_CONFIG.replacen("name = \"chain0\"", "name = \"chain 0!\"", 1);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF00140");
        assert!(err.to_string().contains("'name'"));
    }

    #[tokio::test]
    async fn missing_connector_url_fails_init() {
        let toml = FULL_CONFIG.replacen("type = \"fake\"", "type = \"ethereum\"", 1);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10138");
        assert!(err.to_string().contains("ethconnect.url"));
    }

    #[tokio::test]
    async fn default_namespace_must_be_predefined() {
        let toml = format!("[namespaces]\ndefault = \"ns1\"\n{}", FULL_CONFIG);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10166");
    }

    #[tokio::test]
    async fn node_without_database_fails() {
        let toml = FULL_CONFIG.replacen("[[plugins.database]]", "[[plugins.unused]]", 1);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10128");

        let config = Config::default();
        let mut slots = crate::components::Components::default();
        let err = init_components(&mut slots, &Plugins::default(), &config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "FF10128: Initialization failed in txhelper component: no database configured"
        );
    }

    #[tokio::test]
    async fn start_failure_stops_the_node() {
        let (mut node, _, _) = build(FULL_CONFIG, Behavior::FailStart);
        node.init(CancellationToken::new()).await.unwrap();
        let err = node.start().await.unwrap_err();
        assert_eq!(err.code(), "FF10901");
        assert_eq!(node.state(), State::Stopped);
        assert!(node.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_interrupts_plugin_init() {
        let (mut node, _, _) = build(FULL_CONFIG, Behavior::HangInit);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = node.init(cancel).await.unwrap_err();
        assert_eq!(err.code(), "FF00154");
        assert_eq!(node.state(), State::Stopped);
    }

    #[tokio::test]
    async fn data_exchange_is_added_for_registered_nodes() {
        let toml = FULL_CONFIG.replacen("[[plugins.dataexchange]]", "[[plugins.unused]]", 1);
        let (mut node, log, store) = build(&toml, Behavior::Normal);
        store.add_node("node1");
        node.init(CancellationToken::new()).await.unwrap();
        assert_eq!(node.plugins().data_exchange[0].0, "dataexchange_0");
        assert!(log
            .lock()
            .unwrap()
            .contains(&"nodes:dataexchange_0:1".to_string()));
        node.wait_stop().await;
    }

    #[tokio::test]
    async fn data_exchange_stays_optional_without_nodes() {
        let toml = FULL_CONFIG.replacen("[[plugins.dataexchange]]", "[[plugins.unused]]", 1);
        let (mut node, _, _) = build(&toml, Behavior::Normal);
        node.init(CancellationToken::new()).await.unwrap();
        assert!(node.plugins().data_exchange.is_empty());
        assert!(node.private_messaging().is_some());
        node.wait_stop().await;
    }

    struct RecordingEvents(Log);

    #[async_trait]
    impl Component for RecordingEvents {
        fn name(&self) -> &'static str {
            "events"
        }
    }

    #[async_trait]
    impl crate::components::EventManager for RecordingEvents {
        async fn plugin_event(&self, event: sdk::events::PluginEvent) -> Result<(), CoreError> {
            self.0.lock().unwrap().push(format!("event:{}", event.kind));
            Ok(())
        }

        async fn shared_storage_downloaded(
            &self,
            _namespace: &str,
            _payload_ref: &str,
            _data: Vec<u8>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn rewiring_keeps_the_existing_callback_binding() {
        let (mut node, _, _) = build(FULL_CONFIG, Behavior::Normal);
        node.init(CancellationToken::new()).await.unwrap();

        let seen = Log::default();
        let earlier: Arc<dyn crate::components::EventManager> =
            Arc::new(RecordingEvents(Arc::clone(&seen)));
        let callbacks = crate::orchestrator::BoundCallbacks::new();
        assert!(callbacks.bind(Arc::downgrade(&earlier)));

        wire_peers(&node.components, &callbacks).unwrap();
        callbacks
            .deliver(sdk::events::PluginEvent::new(
                "blockchain",
                "chain0",
                "BatchPin",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["event:BatchPin"]);
        node.wait_stop().await;
    }

    #[tokio::test]
    async fn init_twice_is_rejected() {
        let (mut node, _, _) = build(FULL_CONFIG, Behavior::Normal);
        node.init(CancellationToken::new()).await.unwrap();
        let err = node.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code(), "FF10900");
        node.wait_stop().await;
    }
}
