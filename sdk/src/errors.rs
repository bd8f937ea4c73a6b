//! Error types and handling
//!
//! Every error raised while assembling or running a node renders as
//! `<code>: <detail>`, where the code is stable across releases so operators
//! and tests can match on it. All errors implement [`ErrorExt`], which exposes
//! the code on its own plus a user-facing hint and a recoverability flag.
//!
//! Plugins return these errors from their own operations. The orchestrator
//! passes them to its caller unchanged, so a plugin that reports a missing
//! `url` is reported as exactly that.
//!
//! # Examples
//!
//! ```
//! use sdk::errors::{CoreError, ErrorExt};
//!
//! let err = CoreError::UnknownDatabase("wrong".to_string());
//! assert_eq!(err.code(), "FF10122");
//! assert!(err.to_string().starts_with("FF10122"));
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Extension trait shared by every error in the workspace.
pub trait ErrorExt {
    /// Stable error code, e.g. `FF10122`.
    fn code(&self) -> &'static str;

    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether retrying (or waiting) can make the error go away.
    ///
    /// Configuration problems are never recoverable: the node has to be
    /// restarted with a corrected config file.
    fn is_recoverable(&self) -> bool;
}

/// Node error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // Identifier and descriptor errors
    #[error("FF00140: Field '{field}' must be 1-64 characters, including alphanumerics (a-zA-Z0-9), dot (.), dash (-) and underscore (_), and must start/end in an alphanumeric: '{value}'")]
    InvalidName { field: String, value: String },

    #[error("FF10386: Invalid {category} plugin configuration - {reason}")]
    InvalidPluginConfig { category: String, reason: String },

    #[error("FF10138: Missing configuration '{key}' for {plugin}")]
    MissingPluginConfig { key: String, plugin: String },

    #[error("FF10272: Missing configuration 'plugin' for deprecated tokens entry '{0}'")]
    MissingTokensType(String),

    #[error("FF10273: Missing configuration 'name' for deprecated tokens entry {0}")]
    MissingTokensName(usize),

    // Unknown plugin types, one code per category
    #[error("FF10110: Unknown blockchain plugin '{0}'")]
    UnknownBlockchain(String),

    #[error("FF10122: Unknown database plugin '{0}'")]
    UnknownDatabase(String),

    #[error("FF10134: Unknown shared storage plugin '{0}'")]
    UnknownSharedStorage(String),

    #[error("FF10212: Unknown identity plugin '{0}'")]
    UnknownIdentity(String),

    #[error("FF10213: Unknown data exchange plugin '{0}'")]
    UnknownDataExchange(String),

    #[error("FF10282: Unknown tokens plugin '{0}'")]
    UnknownTokens(String),

    // Component assembly
    #[error("FF10128: Initialization failed in {component} component: no database configured")]
    NoDatabase { component: String },

    #[error("FF10128: Initialization failed in {component} component: missing {prerequisite}")]
    ComponentPrereqMissing {
        component: String,
        prerequisite: String,
    },

    // Namespaces
    #[error("FF10166: Default namespace '{0}' not found in the predefined namespaces list")]
    DefaultNamespaceMissing(String),

    // Identity
    #[error("FF10141: Supplied key '{key}' is not valid for {plugin}")]
    InvalidIdentityKey { plugin: String, key: String },

    // Lifecycle
    #[error("FF00154: Context cancelled")]
    Cancelled,

    #[error("FF10900: Cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    // Runtime failures reported by plugins and storage
    #[error("FF10901: Plugin '{plugin}' failed: {reason}")]
    PluginFailed { plugin: String, reason: String },

    #[error("FF10902: Database operation failed: {0}")]
    Database(String),

    #[error("FF10903: Configuration error: {0}")]
    Config(String),

    #[error("FF10904: Plugin callbacks for {0} are not bound to an event manager")]
    CallbacksNotBound(String),
}

impl CoreError {
    /// Shorthand used by plugins when an outbound call fails.
    pub fn plugin(plugin: impl Into<String>, reason: impl ToString) -> Self {
        Self::PluginFailed {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }
}

impl ErrorExt for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "FF00140",
            Self::InvalidPluginConfig { .. } => "FF10386",
            Self::MissingPluginConfig { .. } => "FF10138",
            Self::MissingTokensType(_) => "FF10272",
            Self::MissingTokensName(_) => "FF10273",
            Self::UnknownBlockchain(_) => "FF10110",
            Self::UnknownDatabase(_) => "FF10122",
            Self::UnknownSharedStorage(_) => "FF10134",
            Self::UnknownIdentity(_) => "FF10212",
            Self::UnknownDataExchange(_) => "FF10213",
            Self::UnknownTokens(_) => "FF10282",
            Self::NoDatabase { .. } | Self::ComponentPrereqMissing { .. } => "FF10128",
            Self::DefaultNamespaceMissing(_) => "FF10166",
            Self::InvalidIdentityKey { .. } => "FF10141",
            Self::Cancelled => "FF00154",
            Self::InvalidState { .. } => "FF10900",
            Self::PluginFailed { .. } => "FF10901",
            Self::Database(_) => "FF10902",
            Self::Config(_) => "FF10903",
            Self::CallbacksNotBound(_) => "FF10904",
        }
    }

    fn user_hint(&self) -> &str {
        match self {
            Self::InvalidName { .. } => "Rename the entry using letters, digits, '.', '-' or '_'",
            Self::InvalidPluginConfig { .. }
            | Self::MissingPluginConfig { .. }
            | Self::MissingTokensType(_)
            | Self::MissingTokensName(_) => "Check the plugin sections of your config file",
            Self::UnknownBlockchain(_)
            | Self::UnknownDatabase(_)
            | Self::UnknownSharedStorage(_)
            | Self::UnknownIdentity(_)
            | Self::UnknownDataExchange(_)
            | Self::UnknownTokens(_) => "The plugin type is not built into this node",
            Self::NoDatabase { .. } => "Configure at least one database plugin",
            Self::ComponentPrereqMissing { .. } => "Configure the plugins this component needs",
            Self::DefaultNamespaceMissing(_) => "Add the default namespace to namespaces.predefined",
            Self::InvalidIdentityKey { .. } => "Check the signing key format for your blockchain",
            Self::Cancelled => "The node is shutting down",
            Self::InvalidState { .. } => "The node is not in a state that allows this operation",
            Self::PluginFailed { .. } => "A connector is unavailable. Check its logs and network",
            Self::Database(_) => "Database operation failed. Check the database is reachable",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::CallbacksNotBound(_) => "Plugin events arrived before the node finished starting",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PluginFailed { .. } | Self::Database(_) | Self::CallbacksNotBound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_starts_with_code() {
        let errors = vec![
            CoreError::InvalidName {
                field: "name".into(),
                value: "bad/".into(),
            },
            CoreError::InvalidPluginConfig {
                category: "database".into(),
                reason: "name and type are required".into(),
            },
            CoreError::NoDatabase {
                component: "batch".into(),
            },
            CoreError::Cancelled,
            CoreError::Database("boom".into()),
        ];
        for err in errors {
            assert!(
                err.to_string().starts_with(err.code()),
                "{} does not start with {}",
                err,
                err.code()
            );
        }
    }

    #[test]
    fn missing_descriptor_fields_mention_name_and_type() {
        let err = CoreError::InvalidPluginConfig {
            category: "blockchain".into(),
            reason: "name and type are required".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid"));
        assert!(msg.contains("name"));
        assert!(msg.contains("type"));
    }

    #[test]
    fn config_errors_are_not_recoverable() {
        assert!(!CoreError::UnknownTokens("x".into()).is_recoverable());
        assert!(!CoreError::DefaultNamespaceMissing("default".into()).is_recoverable());
        assert!(CoreError::plugin("eth0", "connection refused").is_recoverable());
    }
}
