//! Functional managers assembled on top of the plugins
//!
//! Every manager implements [`Component`] plus a trait of its own, and lives
//! in one slot of [`Components`]. The orchestrator fills empty slots with the
//! default implementation from the matching module; a slot that is already
//! set (a test double, or an embedder's own manager) is left alone.
//!
//! Default managers never spawn work in their constructors. Background
//! tasks start in [`Component::start`] and are joined in
//! [`Component::wait_stop`].

pub mod adminevents;
pub mod assets;
pub mod batch;
pub mod batchpin;
pub mod broadcast;
pub mod contracts;
pub mod data;
pub mod definitions;
pub mod events;
pub mod identity;
pub mod messaging;
pub mod metrics;
pub mod networkmap;
pub mod operations;
pub mod shareddownload;
pub mod txhelper;

pub use adminevents::AdminEvents;
pub use assets::AssetManager;
pub use batch::{Batch, BatchDispatcher, BatchManager, BatchMessage};
pub use batchpin::BatchPinSubmitter;
pub use broadcast::BroadcastManager;
pub use contracts::ContractManager;
pub use data::DataManager;
pub use definitions::DefinitionHandler;
pub use events::EventManager;
pub use identity::IdentityManager;
pub use messaging::PrivateMessaging;
pub use metrics::MetricsManager;
pub use networkmap::NetworkMap;
pub use operations::OperationsManager;
pub use shareddownload::SharedDownloadManager;
pub use txhelper::TxHelper;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sdk::errors::CoreError;
use std::sync::Arc;

/// Lifecycle shared by every manager.
#[async_trait]
pub trait Component: Send + Sync {
    /// Component name used in logs and errors
    fn name(&self) -> &'static str;

    async fn start(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Returns once all background work has exited. The node cancels its
    /// root token before calling this.
    async fn wait_stop(&self) {}
}

/// One slot per manager. Empty until the orchestrator initializes or a
/// caller presets it.
#[derive(Default, Clone)]
pub struct Components {
    pub tx_helper: Option<Arc<dyn TxHelper>>,
    pub identity: Option<Arc<dyn IdentityManager>>,
    pub data: Option<Arc<dyn DataManager>>,
    pub batch: Option<Arc<dyn BatchManager>>,
    pub operations: Option<Arc<dyn OperationsManager>>,
    pub batch_pin: Option<Arc<dyn BatchPinSubmitter>>,
    pub messaging: Option<Arc<dyn PrivateMessaging>>,
    pub broadcast: Option<Arc<dyn BroadcastManager>>,
    pub assets: Option<Arc<dyn AssetManager>>,
    pub contracts: Option<Arc<dyn ContractManager>>,
    pub definitions: Option<Arc<dyn DefinitionHandler>>,
    pub shared_download: Option<Arc<dyn SharedDownloadManager>>,
    pub events: Option<Arc<dyn EventManager>>,
    pub network_map: Option<Arc<dyn NetworkMap>>,
    pub admin_events: Option<Arc<dyn AdminEvents>>,
    pub metrics: Option<Arc<dyn MetricsManager>>,
}

macro_rules! each_slot {
    ($components:expr, $slot:ident => $body:expr) => {{
        let c = $components;
        each_slot!(@ c, $slot => $body;
            tx_helper identity data batch operations batch_pin messaging broadcast assets
            contracts definitions shared_download events network_map admin_events metrics)
    }};
    (@ $c:ident, $slot:ident => $body:expr; $($field:ident)*) => {{
        $(
            if let Some($slot) = &$c.$field {
                $body;
            }
        )*
    }};
}

impl Components {
    /// Names of the filled slots.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        each_slot!(self, component => names.push(component.name()));
        names
    }

    /// `wait_stop` of every filled slot.
    pub fn stop_futures(&self) -> Vec<BoxFuture<'_, ()>> {
        let mut stops = Vec::new();
        each_slot!(self, component => stops.push(component.wait_stop()));
        stops
    }
}

/// Returns the component in `slot`, or `ComponentPrereqMissing` naming both
/// the component being built and the missing prerequisite.
pub fn require<T: ?Sized>(
    slot: &Option<Arc<T>>,
    component: &str,
    prerequisite: &str,
) -> Result<Arc<T>, CoreError> {
    slot.clone().ok_or_else(|| CoreError::ComponentPrereqMissing {
        component: component.to_string(),
        prerequisite: prerequisite.to_string(),
    })
}
