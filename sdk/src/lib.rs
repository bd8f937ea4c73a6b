//! Ledgerlink SDK
//!
//! Shared library providing the plugin capability traits, domain types and
//! error codes. This crate is used by both the engine and plugin authors.

/// Scoped configuration handle
pub mod config;

/// Error types and handling
pub mod errors;

/// Plugin events and callbacks
pub mod events;

/// Metrics handle
pub mod metrics;

/// Plugin capability traits
pub mod plugins;

/// Namespaces, identities and identifier validation
pub mod types;

// Re-export commonly used types
pub use config::{ConfigHandle, ConfigHandleImpl};
pub use errors::{CoreError, ErrorExt};
pub use events::{Callbacks, PluginEvent};
pub use metrics::Metrics;
pub use plugins::PluginContext;
pub use types::{
    validate_name, Identity, IdentityFilter, IdentityType, Namespace, NamespaceType,
    SYSTEM_NAMESPACE,
};
