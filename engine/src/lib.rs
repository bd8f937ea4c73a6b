//! Ledgerlink Engine Library
//!
//! The node orchestrator together with the built-in plugins and default
//! component managers. Used by the `ledgerlink` binary and by integration
//! tests.

/// Configuration management module
pub mod config;

/// Built-in plugin implementations and their factories
pub mod plugins;

/// Default component managers
pub mod components;

/// Plugin and component assembly, lifecycle and namespace bootstrap
pub mod orchestrator;

/// Background task bookkeeping shared by managers and plugins
pub mod worker;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;
