//! Plugin descriptor normalization
//!
//! Turns either configuration schema into one ordered list of
//! [`PluginDescriptor`]s per category:
//!
//! - `[[plugins.<category>]]` arrays, each entry with `name`, `type` and a
//!   sub-table named after the type;
//! - the deprecated top-level singletons (`[database]`, `[blockchain]`, ...)
//!   which yield one descriptor named `<category>_0`;
//! - the deprecated `[[tokens]]` array, whose entries use `plugin` for the
//!   type and are themselves the plugin config.
//!
//! The new schema wins whenever it has entries for a category.

use super::{Config, RawSection, ScopedConfig};
use sdk::errors::CoreError;
use sdk::types::validate_name;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Database,
    Blockchain,
    SharedStorage,
    DataExchange,
    Identity,
    Tokens,
}

impl PluginCategory {
    /// Every category, in initialization order.
    pub const ALL: [PluginCategory; 6] = [
        Self::Database,
        Self::Identity,
        Self::Blockchain,
        Self::SharedStorage,
        Self::DataExchange,
        Self::Tokens,
    ];

    /// Config key of the category, both under `plugins.` and at top level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Blockchain => "blockchain",
            Self::SharedStorage => "sharedstorage",
            Self::DataExchange => "dataexchange",
            Self::Identity => "identity",
            Self::Tokens => "tokens",
        }
    }

    /// The category's "unknown plugin type" error.
    pub fn unknown_type(&self, plugin_type: &str) -> CoreError {
        let t = plugin_type.to_string();
        match self {
            Self::Database => CoreError::UnknownDatabase(t),
            Self::Blockchain => CoreError::UnknownBlockchain(t),
            Self::SharedStorage => CoreError::UnknownSharedStorage(t),
            Self::DataExchange => CoreError::UnknownDataExchange(t),
            Self::Identity => CoreError::UnknownIdentity(t),
            Self::Tokens => CoreError::UnknownTokens(t),
        }
    }

    /// Type assumed when a deprecated singleton omits `type`.
    fn deprecated_default_type(&self) -> Option<&'static str> {
        match self {
            Self::Blockchain => Some("ethereum"),
            Self::SharedStorage => Some("ipfs"),
            Self::DataExchange => Some("ffdx"),
            Self::Database | Self::Identity | Self::Tokens => None,
        }
    }

    /// Instance name given to a descriptor the user did not name.
    pub fn synthesized_name(&self) -> String {
        format!("{}_0", self.as_str())
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSource {
    /// `[[plugins.<category>]]`
    Plugins,
    /// A deprecated top-level key
    Deprecated,
    /// Created by the orchestrator because the category has a default
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    pub name: String,
    pub plugin_type: String,
    pub config: ScopedConfig,
    pub source: DescriptorSource,
}

impl PluginDescriptor {
    /// Descriptor for a plugin the node adds on its own, named `<category>_0`.
    pub fn synthesized(category: PluginCategory, plugin_type: &str, config: ScopedConfig) -> Self {
        Self {
            name: category.synthesized_name(),
            plugin_type: plugin_type.to_string(),
            config,
            source: DescriptorSource::Synthesized,
        }
    }
}

/// Loads the descriptors for `category` from whichever schema is in use.
pub fn load_plugins(
    config: &Config,
    category: PluginCategory,
) -> Result<Vec<PluginDescriptor>, CoreError> {
    let entries = config.plugin_entries(category);
    let descriptors = if !entries.is_empty() {
        if has_deprecated(config, category) {
            warn!(
                category = category.as_str(),
                "Both plugins.{} and the deprecated '{}' key are set; the deprecated key is ignored",
                category,
                category
            );
        }
        from_plugin_entries(category, entries)?
    } else if category == PluginCategory::Tokens {
        match &config.tokens {
            Some(entries) => from_deprecated_tokens(entries)?,
            None => Vec::new(),
        }
    } else if let Some(section) = config.deprecated_section(category) {
        vec![from_deprecated_section(category, section)]
    } else {
        Vec::new()
    };

    check_unique(category, &descriptors)?;
    Ok(descriptors)
}

fn has_deprecated(config: &Config, category: PluginCategory) -> bool {
    match category {
        PluginCategory::Tokens => config.tokens.as_ref().is_some_and(|t| !t.is_empty()),
        _ => config.deprecated_section(category).is_some(),
    }
}

/// Non-empty string value of `key`.
fn string_field<'a>(section: &'a RawSection, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn from_plugin_entries(
    category: PluginCategory,
    entries: &[RawSection],
) -> Result<Vec<PluginDescriptor>, CoreError> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (name, plugin_type) = match (string_field(entry, "name"), string_field(entry, "type")) {
                (Some(name), Some(plugin_type)) => (name, plugin_type),
                _ => {
                    return Err(CoreError::InvalidPluginConfig {
                        category: category.to_string(),
                        reason: "name and type are required".to_string(),
                    })
                }
            };
            validate_name("name", name)?;
            Ok(PluginDescriptor {
                name: name.to_string(),
                plugin_type: plugin_type.to_string(),
                config: ScopedConfig::subsection(
                    format!("plugins.{}[{}].{}", category, i, plugin_type),
                    entry,
                    plugin_type,
                ),
                source: DescriptorSource::Plugins,
            })
        })
        .collect()
}

fn from_deprecated_section(category: PluginCategory, section: &RawSection) -> PluginDescriptor {
    let plugin_type = string_field(section, "type")
        .or_else(|| category.deprecated_default_type())
        .unwrap_or_default()
        .to_string();
    PluginDescriptor {
        name: category.synthesized_name(),
        config: ScopedConfig::subsection(
            format!("{}.{}", category, plugin_type),
            section,
            &plugin_type,
        ),
        plugin_type,
        source: DescriptorSource::Deprecated,
    }
}

fn from_deprecated_tokens(entries: &[RawSection]) -> Result<Vec<PluginDescriptor>, CoreError> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let name = string_field(entry, "name").ok_or(CoreError::MissingTokensName(i))?;
            validate_name("name", name)?;
            let plugin_type = string_field(entry, "plugin")
                .ok_or_else(|| CoreError::MissingTokensType(name.to_string()))?;
            Ok(PluginDescriptor {
                name: name.to_string(),
                plugin_type: plugin_type.to_string(),
                config: ScopedConfig::new(format!("tokens[{}]", i), entry.clone()),
                source: DescriptorSource::Deprecated,
            })
        })
        .collect()
}

fn check_unique(category: PluginCategory, descriptors: &[PluginDescriptor]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        if !seen.insert(descriptor.name.as_str()) {
            return Err(CoreError::InvalidPluginConfig {
                category: category.to_string(),
                reason: format!("duplicate plugin name '{}'", descriptor.name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Config {
        Config::from_toml_str(toml).unwrap()
    }

    #[test]
    fn new_schema_keeps_declaration_order() {
        let cfg = config(
            r#"
            [[plugins.tokens]]
            name = "erc20"
            type = "fftokens"
            fftokens = { url = "http://erc20" }

            [[plugins.tokens]]
            name = "erc1155"
            type = "fftokens"
            fftokens = { url = "http://erc1155" }
            "#,
        );
        let descriptors = load_plugins(&cfg, PluginCategory::Tokens).unwrap();
        let names: Vec<_> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["erc20", "erc1155"]);
        assert_eq!(
            descriptors[1].config.handle().get_string("url").as_deref(),
            Some("http://erc1155")
        );
        assert_eq!(descriptors[1].config.scope(), "plugins.tokens[1].fftokens");
    }

    #[test]
    fn missing_type_is_rejected() {
        let cfg = config("[[plugins.database]]\nname = \"db0\"\n");
        let err = load_plugins(&cfg, PluginCategory::Database).unwrap_err();
        assert!(err.to_string().starts_with("FF10386"));
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn missing_name_is_checked_before_name_syntax() {
        let cfg = config("[[plugins.blockchain]]\ntype = \"ethereum\"\n");
        let err = load_plugins(&cfg, PluginCategory::Blockchain).unwrap_err();
        assert!(err.to_string().starts_with("FF10386"));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn bad_name_is_rejected() {
        let cfg = config("[[plugins.sharedstorage]]\nname = \"wrong////\"\ntype = \"ipfs\"\n");
        let err = load_plugins(&cfg, PluginCategory::SharedStorage).unwrap_err();
        assert!(err.to_string().starts_with("FF00140"));
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let cfg = config(
            r#"
            [[plugins.database]]
            name = "db"
            type = "postgres"
            [[plugins.database]]
            name = "db"
            type = "sqlite3"
            "#,
        );
        let err = load_plugins(&cfg, PluginCategory::Database).unwrap_err();
        assert!(err.to_string().starts_with("FF10386"));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn deprecated_singleton_gets_synthesized_name() {
        let cfg = config("[database]\ntype = \"postgres\"\n[database.postgres]\nurl = \"postgres://x\"\n");
        let descriptors = load_plugins(&cfg, PluginCategory::Database).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "database_0");
        assert_eq!(descriptors[0].plugin_type, "postgres");
        assert_eq!(descriptors[0].source, DescriptorSource::Deprecated);
        assert_eq!(
            descriptors[0].config.handle().get_string("url").as_deref(),
            Some("postgres://x")
        );
    }

    #[test]
    fn deprecated_blockchain_defaults_to_ethereum() {
        let cfg = config("[blockchain.ethereum.ethconnect]\nurl = \"http://eth\"\n");
        let descriptors = load_plugins(&cfg, PluginCategory::Blockchain).unwrap();
        assert_eq!(descriptors[0].plugin_type, "ethereum");
        assert_eq!(
            descriptors[0].config.handle().get_string("ethconnect.url").as_deref(),
            Some("http://eth")
        );
    }

    #[test]
    fn new_schema_wins_over_deprecated() {
        let cfg = config(
            r#"
            [database]
            type = "sqlite3"

            [[plugins.database]]
            name = "primary"
            type = "postgres"
            "#,
        );
        let descriptors = load_plugins(&cfg, PluginCategory::Database).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "primary");
        assert_eq!(descriptors[0].source, DescriptorSource::Plugins);
    }

    #[test]
    fn deprecated_tokens_checks_name_then_plugin() {
        let missing_name = config("[[tokens]]\nplugin = \"fftokens\"\n");
        let err = load_plugins(&missing_name, PluginCategory::Tokens).unwrap_err();
        assert!(err.to_string().starts_with("FF10273"));

        let bad_name = config("[[tokens]]\nname = \"/////////////\"\nplugin = \"fftokens\"\n");
        let err = load_plugins(&bad_name, PluginCategory::Tokens).unwrap_err();
        assert!(err.to_string().starts_with("FF00140"));

        let missing_plugin = config("[[tokens]]\nname = \"erc1155\"\n");
        let err = load_plugins(&missing_plugin, PluginCategory::Tokens).unwrap_err();
        assert!(err.to_string().starts_with("FF10272"));
    }

    #[test]
    fn deprecated_tokens_entry_is_its_own_config() {
        let cfg = config("[[tokens]]\nname = \"erc1155\"\nplugin = \"fftokens\"\nurl = \"http://tok\"\n");
        let descriptors = load_plugins(&cfg, PluginCategory::Tokens).unwrap();
        assert_eq!(descriptors[0].plugin_type, "fftokens");
        assert_eq!(
            descriptors[0].config.handle().get_string("url").as_deref(),
            Some("http://tok")
        );
    }

    #[test]
    fn identity_has_no_deprecated_schema() {
        let cfg = config("");
        assert!(load_plugins(&cfg, PluginCategory::Identity).unwrap().is_empty());
        assert!(load_plugins(&cfg, PluginCategory::Database).unwrap().is_empty());
    }
}
