//! In-process counters
//!
//! Exporters are not part of the node; counters are kept in memory and can
//! be read back with [`MetricsManager::snapshot`].

use super::Component;
use async_trait::async_trait;
use sdk::errors::CoreError;
use sdk::metrics::Metrics;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::info;

pub trait MetricsManager: Component + Metrics {
    fn counter(&self, name: &str) -> u64;

    fn snapshot(&self) -> BTreeMap<String, u64>;

    /// This manager as the handle plugins record into.
    fn as_metrics(self: Arc<Self>) -> Arc<dyn Metrics>;
}

pub struct Manager {
    enabled: bool,
    counters: Mutex<HashMap<String, u64>>,
}

impl Manager {
    pub fn new(enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            enabled,
            counters: Mutex::new(HashMap::new()),
        })
    }
}

impl Metrics for Manager {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn increment(&self, counter: &str) {
        if !self.enabled {
            return;
        }
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counters.entry(counter.to_string()).or_insert(0) += 1;
    }
}

impl MetricsManager for Manager {
    fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn as_metrics(self: Arc<Self>) -> Arc<dyn Metrics> {
        self
    }
}

#[async_trait]
impl Component for Manager {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn start(&self) -> Result<(), CoreError> {
        info!(enabled = self.enabled, "Metrics started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_do_not_count() {
        let metrics = Manager::new(false);
        metrics.increment("events");
        assert_eq!(metrics.counter("events"), 0);

        let metrics = Manager::new(true);
        metrics.increment("events");
        metrics.increment("events");
        assert_eq!(metrics.counter("events"), 2);
        assert_eq!(metrics.snapshot().get("events"), Some(&2));
    }
}
