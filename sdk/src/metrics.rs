//! Metrics handle passed to plugins that record counters

pub trait Metrics: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Adds one to the named counter. No-op when metrics are disabled.
    fn increment(&self, counter: &str);
}
