//! Node orchestrator
//!
//! The [`Orchestrator`] assembles a node from its configuration in three
//! layers and then drives its lifecycle:
//!
//! 1. **Plugins**: descriptors from either config schema are instantiated
//!    through the [`Factories`] and initialized category by category
//!    ([`plugins::Plugins::init`]).
//! 2. **Components**: the default managers are built on top of the plugins
//!    and wired to each other ([`components::init_components`],
//!    [`components::wire_peers`]).
//! 3. **Namespaces**: the predefined namespaces are written to the database
//!    ([`namespaces::init_namespaces`]).
//!
//! # Examples
//!
//! ```no_run
//! use ledgerlink_engine::config::Config;
//! use ledgerlink_engine::orchestrator::Orchestrator;
//! use ledgerlink_engine::plugins::Factories;
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_from_path(Path::new("config.toml"))?;
//! let mut node = Orchestrator::new(config, Factories::builtin());
//! node.init(CancellationToken::new()).await?;
//! node.start().await?;
//! // ... serve until asked to stop
//! node.wait_stop().await;
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod components;
pub mod lifecycle;
pub mod namespaces;
pub mod plugins;

#[cfg(test)]
pub(crate) mod testing;

pub use callbacks::BoundCallbacks;
pub use lifecycle::State;
pub use plugins::Plugins;

use crate::components::{
    AdminEvents, AssetManager, BroadcastManager, Components, ContractManager, DataManager,
    EventManager, IdentityManager, MetricsManager, NetworkMap, OperationsManager,
    PrivateMessaging,
};
use crate::config::Config;
use crate::plugins::Factories;
use sdk::errors::CoreError;
use sdk::types::Namespace;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct Orchestrator {
    config: Config,
    factories: Factories,
    state: Mutex<State>,
    cancel: CancellationToken,
    callbacks: Arc<BoundCallbacks>,
    plugins: Plugins,
    components: Components,
    namespaces: Vec<Namespace>,
    stopped: tokio::sync::Mutex<bool>,
}

impl Orchestrator {
    pub fn new(config: Config, factories: Factories) -> Self {
        Self {
            config,
            factories,
            state: Mutex::new(State::Uninitialized),
            cancel: CancellationToken::new(),
            callbacks: BoundCallbacks::new(),
            plugins: Plugins::default(),
            components: Components::default(),
            namespaces: Vec::new(),
            stopped: tokio::sync::Mutex::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: State) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Root token. Cancelled on stop or on a failed init/start.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Slots may be preset with custom managers until `init` runs.
    pub fn components_mut(&mut self) -> Result<&mut Components, CoreError> {
        match self.state() {
            State::Uninitialized => Ok(&mut self.components),
            other => Err(CoreError::invalid_state("replace components", other)),
        }
    }

    /// Namespaces written during init, system namespace first.
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn broadcast(&self) -> Option<Arc<dyn BroadcastManager>> {
        self.components.broadcast.clone()
    }

    pub fn private_messaging(&self) -> Option<Arc<dyn PrivateMessaging>> {
        self.components.messaging.clone()
    }

    pub fn events(&self) -> Option<Arc<dyn EventManager>> {
        self.components.events.clone()
    }

    pub fn network_map(&self) -> Option<Arc<dyn NetworkMap>> {
        self.components.network_map.clone()
    }

    pub fn assets(&self) -> Option<Arc<dyn AssetManager>> {
        self.components.assets.clone()
    }

    pub fn contracts(&self) -> Option<Arc<dyn ContractManager>> {
        self.components.contracts.clone()
    }

    pub fn data(&self) -> Option<Arc<dyn DataManager>> {
        self.components.data.clone()
    }

    pub fn identity(&self) -> Option<Arc<dyn IdentityManager>> {
        self.components.identity.clone()
    }

    pub fn operations(&self) -> Option<Arc<dyn OperationsManager>> {
        self.components.operations.clone()
    }

    pub fn admin_events(&self) -> Option<Arc<dyn AdminEvents>> {
        self.components.admin_events.clone()
    }

    pub fn metrics(&self) -> Option<Arc<dyn MetricsManager>> {
        self.components.metrics.clone()
    }
}
