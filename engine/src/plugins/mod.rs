//! Built-in plugins and the factories that construct them by type name
//!
//! Each category has one [`Factory`] mapping a `type` string from the config
//! to a constructor. [`Factories::builtin`] registers everything compiled
//! into this binary; embedders and tests can register more before handing
//! the factories to the orchestrator.

pub mod blockchain;
pub mod database;
pub mod dataexchange;
pub mod eventstream;
pub mod identity;
pub mod sharedstorage;
pub mod tokens;

use crate::config::{DescriptorSource, PluginCategory, PluginDescriptor};
use sdk::errors::CoreError;
use sdk::plugins::{
    blockchain as blockchain_api, database as database_api, dataexchange as dataexchange_api,
    identity as identity_api, sharedstorage as sharedstorage_api, tokens as tokens_api,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Constructs an uninitialized plugin instance.
pub type Constructor<P> = Arc<dyn Fn() -> Box<P> + Send + Sync>;

/// Shared storage types accepted from the deprecated `[sharedstorage]` key.
const DEPRECATED_SHARED_STORAGE_TYPES: [&str; 1] = ["ipfs"];

pub struct Factory<P: ?Sized> {
    category: PluginCategory,
    constructors: BTreeMap<String, Constructor<P>>,
}

impl<P: ?Sized> Clone for Factory<P> {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            constructors: self.constructors.clone(),
        }
    }
}

impl<P: ?Sized> Factory<P> {
    pub fn new(category: PluginCategory) -> Self {
        Self {
            category,
            constructors: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) the constructor for `plugin_type`.
    pub fn register<F>(&mut self, plugin_type: &str, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<P> + Send + Sync + 'static,
    {
        self.constructors
            .insert(plugin_type.to_string(), Arc::new(constructor));
        self
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiates the plugin a descriptor asks for.
    pub fn instantiate(&self, descriptor: &PluginDescriptor) -> Result<Box<P>, CoreError> {
        if self.category == PluginCategory::SharedStorage
            && descriptor.source == DescriptorSource::Deprecated
            && !DEPRECATED_SHARED_STORAGE_TYPES.contains(&descriptor.plugin_type.as_str())
        {
            return Err(self.category.unknown_type(&descriptor.plugin_type));
        }
        self.constructors
            .get(&descriptor.plugin_type)
            .map(|constructor| constructor())
            .ok_or_else(|| self.category.unknown_type(&descriptor.plugin_type))
    }
}

/// One factory per plugin category.
#[derive(Clone)]
pub struct Factories {
    pub database: Factory<dyn database_api::Plugin>,
    pub blockchain: Factory<dyn blockchain_api::Plugin>,
    pub shared_storage: Factory<dyn sharedstorage_api::Plugin>,
    pub data_exchange: Factory<dyn dataexchange_api::Plugin>,
    pub identity: Factory<dyn identity_api::Plugin>,
    pub tokens: Factory<dyn tokens_api::Plugin>,
}

impl Factories {
    /// Factories with no types registered.
    pub fn empty() -> Self {
        Self {
            database: Factory::new(PluginCategory::Database),
            blockchain: Factory::new(PluginCategory::Blockchain),
            shared_storage: Factory::new(PluginCategory::SharedStorage),
            data_exchange: Factory::new(PluginCategory::DataExchange),
            identity: Factory::new(PluginCategory::Identity),
            tokens: Factory::new(PluginCategory::Tokens),
        }
    }

    /// Every plugin type compiled into this binary.
    pub fn builtin() -> Self {
        let mut factories = Self::empty();
        factories
            .database
            .register("postgres", || Box::new(database::Postgres::new()))
            .register("sqlite3", || Box::new(database::Sqlite::new()));
        factories
            .blockchain
            .register("ethereum", || Box::new(blockchain::Ethereum::new()))
            .register("fabric", || Box::new(blockchain::Fabric::new()));
        factories
            .shared_storage
            .register("ipfs", || Box::new(sharedstorage::Ipfs::new()))
            .register("filesystem", || Box::new(sharedstorage::Filesystem::new()));
        factories
            .data_exchange
            .register("ffdx", || Box::new(dataexchange::Ffdx::new()));
        factories
            .identity
            .register("onchain", || Box::new(identity::Onchain::new()));
        factories
            .tokens
            .register("fftokens", || Box::new(tokens::FfTokens::new()));
        factories
    }
}

impl Default for Factories {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopedConfig;

    fn descriptor(plugin_type: &str, source: DescriptorSource) -> PluginDescriptor {
        PluginDescriptor {
            name: "p0".into(),
            plugin_type: plugin_type.into(),
            config: ScopedConfig::empty("test"),
            source,
        }
    }

    #[test]
    fn builtin_types_instantiate() {
        let factories = Factories::builtin();
        let db = factories
            .database
            .instantiate(&descriptor("sqlite3", DescriptorSource::Plugins))
            .unwrap();
        assert_eq!(db.name(), "sqlite3");
        assert_eq!(
            factories.blockchain.types().collect::<Vec<_>>(),
            ["ethereum", "fabric"]
        );
    }

    #[test]
    fn unknown_type_uses_category_code() {
        let factories = Factories::builtin();
        let err = factories
            .database
            .instantiate(&descriptor("wrong", DescriptorSource::Plugins))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "FF10122: Unknown database plugin 'wrong'");

        let err = factories
            .tokens
            .instantiate(&descriptor("wrong//", DescriptorSource::Plugins))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("FF10282"));
    }

    #[test]
    fn deprecated_shared_storage_only_accepts_ipfs() {
        let factories = Factories::builtin();
        assert!(factories
            .shared_storage
            .instantiate(&descriptor("filesystem", DescriptorSource::Plugins))
            .is_ok());
        let err = factories
            .shared_storage
            .instantiate(&descriptor("filesystem", DescriptorSource::Deprecated))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("FF10134"));
    }
}
