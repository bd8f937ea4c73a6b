//! Plugin callbacks, bound to the events manager once it exists
//!
//! Plugins receive their callbacks handle during init, before any component
//! has been built. The handle starts unbound and is pointed at the events
//! manager during wiring. It holds the manager weakly so plugins never keep
//! a component alive.

use crate::components::EventManager;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::events::{Callbacks, PluginEvent};
use std::sync::{Arc, OnceLock, Weak};

#[derive(Default)]
pub struct BoundCallbacks {
    events: OnceLock<Weak<dyn EventManager>>,
}

impl BoundCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Binds the handle. Only the first call has any effect.
    pub fn bind(&self, events: Weak<dyn EventManager>) -> bool {
        self.events.set(events).is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.events.get().is_some()
    }
}

#[async_trait]
impl Callbacks for BoundCallbacks {
    async fn deliver(&self, event: PluginEvent) -> Result<(), CoreError> {
        let events = self
            .events
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| CoreError::CallbacksNotBound(event.plugin.clone()))?;
        events.plugin_event(event).await
    }
}
