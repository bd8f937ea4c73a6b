//! Configuration management
//!
//! This module handles loading and validation of the node configuration.
//! Configuration is stored in TOML format, by default at
//! `~/.ledgerlink/config.toml`.
//!
//! # Configuration Sections
//!
//! - **log**: log level
//! - **node** / **org**: identity of this node and its owning organization
//! - **namespaces**: default namespace and the predefined list
//! - **metrics**, **batch**, **download**: component tuning
//! - **plugins**: one array of named plugin entries per category
//! - **database**, **blockchain**, **sharedstorage**, **dataexchange**,
//!   **tokens**: the deprecated single-instance schema, still honored when
//!   the matching `plugins` array is absent
//!
//! Plugin sections are kept as raw tables. Their keys are only interpreted
//! by [`plugins::load_plugins`] and by the plugin the section belongs to.
//!
//! # Examples
//!
//! ```no_run
//! use ledgerlink_engine::config::Config;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_from_path(Path::new("config.toml"))?;
//! println!("Default namespace: {}", config.namespaces.default);
//! # Ok(())
//! # }
//! ```

pub mod plugins;
pub mod scoped;

pub use plugins::{load_plugins, DescriptorSource, PluginCategory, PluginDescriptor};
pub use scoped::ScopedConfig;

use sdk::errors::CoreError;
use sdk::types::validate_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A plugin or deprecated section exactly as written in the file.
pub type RawSection = serde_json::Map<String, serde_json::Value>;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub org: OrgConfig,

    #[serde(default)]
    pub namespaces: NamespacesConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    /// New-style plugin arrays
    #[serde(default)]
    pub plugins: PluginsConfig,

    // Deprecated single-instance sections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<RawSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<RawSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharedstorage: Option<RawSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataexchange: Option<RawSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<RawSection>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgConfig {
    #[serde(default)]
    pub name: String,

    /// Signing key of the org on the blockchain, verified at startup
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacesConfig {
    /// Namespace used when a request names none
    #[serde(default = "default_namespace")]
    pub default: String,

    /// Namespaces created (or refreshed) at every boot. An explicit empty
    /// list stays empty and fails the default-namespace check.
    #[serde(default = "default_predefined")]
    pub predefined: Vec<PredefinedNamespace>,
}

impl Default for NamespacesConfig {
    fn default() -> Self {
        Self {
            default: default_namespace(),
            predefined: default_predefined(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredefinedNamespace {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Messages per batch before an early flush
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Longest a message waits before its batch is flushed
    #[serde(default = "default_batch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            timeout_ms: default_batch_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_workers")]
    pub workers: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: default_download_workers(),
        }
    }
}

/// `[[plugins.<category>]]` arrays. Each entry carries `name`, `type` and a
/// sub-table named after the type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub database: Vec<RawSection>,

    #[serde(default)]
    pub blockchain: Vec<RawSection>,

    #[serde(default)]
    pub sharedstorage: Vec<RawSection>,

    #[serde(default)]
    pub dataexchange: Vec<RawSection>,

    #[serde(default)]
    pub identity: Vec<RawSection>,

    #[serde(default)]
    pub tokens: Vec<RawSection>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_predefined() -> Vec<PredefinedNamespace> {
    vec![PredefinedNamespace {
        name: default_namespace(),
        description: "Default predefined namespace".to_string(),
    }]
}

fn default_batch_size() -> usize {
    200
}

fn default_batch_timeout_ms() -> u64 {
    500
}

fn default_download_workers() -> usize {
    10
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, CoreError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&contents)?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem.
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        toml::from_str(contents)
            .map_err(|e| CoreError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf, CoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".ledgerlink").join("config.toml"))
    }

    /// Checks the settings that are not owned by a plugin. Plugin sections
    /// are validated later, when their descriptors are loaded.
    pub fn validate_and_process(&mut self) -> Result<(), CoreError> {
        self.log.level = self.log.level.to_lowercase();
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(CoreError::Config(format!(
                "Invalid log level '{}': expected one of {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }

        validate_name("namespaces.default", &self.namespaces.default)?;

        if self.batch.size == 0 {
            return Err(CoreError::Config("batch.size must be at least 1".to_string()));
        }
        if self.batch.timeout_ms == 0 {
            return Err(CoreError::Config(
                "batch.timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.download.workers == 0 {
            return Err(CoreError::Config(
                "download.workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// New-style entries for `category`.
    pub fn plugin_entries(&self, category: PluginCategory) -> &[RawSection] {
        match category {
            PluginCategory::Database => &self.plugins.database,
            PluginCategory::Blockchain => &self.plugins.blockchain,
            PluginCategory::SharedStorage => &self.plugins.sharedstorage,
            PluginCategory::DataExchange => &self.plugins.dataexchange,
            PluginCategory::Identity => &self.plugins.identity,
            PluginCategory::Tokens => &self.plugins.tokens,
        }
    }

    /// Deprecated singleton section for `category`, if the category has one.
    pub fn deprecated_section(&self, category: PluginCategory) -> Option<&RawSection> {
        match category {
            PluginCategory::Database => self.database.as_ref(),
            PluginCategory::Blockchain => self.blockchain.as_ref(),
            PluginCategory::SharedStorage => self.sharedstorage.as_ref(),
            PluginCategory::DataExchange => self.dataexchange.as_ref(),
            PluginCategory::Identity | PluginCategory::Tokens => None,
        }
    }
}
