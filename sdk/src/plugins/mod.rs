//! Capability contracts for every plugin category
//!
//! Each category is a separate trait so the orchestrator can hand each plugin
//! exactly the collaborators its category needs at init. All plugins are
//! constructed empty by a factory, initialized once with `&mut self`, and then
//! shared read-only behind an `Arc` for the rest of the node's life.

pub mod blockchain;
pub mod database;
pub mod dataexchange;
pub mod identity;
pub mod sharedstorage;
pub mod tokens;

use tokio_util::sync::CancellationToken;

/// Per-instance context passed to every plugin `init`.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Instance name from the descriptor, e.g. `eth0` or `database_0`
    pub name: String,
    /// Cancelled when the node stops; background tasks must exit on it
    pub cancel: CancellationToken,
}

impl PluginContext {
    pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            cancel,
        }
    }
}
