//! Plugin layer: instantiate and initialize every configured plugin
//!
//! Categories are initialized in dependency order: database, identity,
//! blockchain, shared storage, data exchange, tokens. Within a category every
//! descriptor is instantiated before the first `init`, so an unknown type
//! fails before any plugin of that category has done work. The first `init`
//! error aborts the whole layer.

use crate::config::{load_plugins, Config, PluginCategory, PluginDescriptor, ScopedConfig};
use crate::plugins::{Factories, Factory};
use futures::future::BoxFuture;
use sdk::errors::CoreError;
use sdk::events::Callbacks;
use sdk::metrics::Metrics;
use sdk::plugins::{
    blockchain, database, dataexchange, identity, sharedstorage, tokens, PluginContext,
};
use sdk::types::{IdentityFilter, IdentityType};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Initialized plugins of one category, in declaration order, keyed by
/// instance name.
pub type Registered<P> = Vec<(String, Arc<P>)>;

#[derive(Default, Clone)]
pub struct Plugins {
    pub database: Registered<dyn database::Plugin>,
    pub identity: Registered<dyn identity::Plugin>,
    pub blockchain: Registered<dyn blockchain::Plugin>,
    pub shared_storage: Registered<dyn sharedstorage::Plugin>,
    pub data_exchange: Registered<dyn dataexchange::Plugin>,
    pub tokens: Registered<dyn tokens::Plugin>,
}

fn first<P: ?Sized>(registered: &Registered<P>) -> Option<Arc<P>> {
    registered.first().map(|(_, plugin)| Arc::clone(plugin))
}

impl Plugins {
    pub fn database(&self) -> Option<Arc<dyn database::Plugin>> {
        first(&self.database)
    }

    pub fn blockchain(&self) -> Option<Arc<dyn blockchain::Plugin>> {
        first(&self.blockchain)
    }

    pub fn identity(&self) -> Option<Arc<dyn identity::Plugin>> {
        first(&self.identity)
    }

    pub fn shared_storage(&self) -> Option<Arc<dyn sharedstorage::Plugin>> {
        first(&self.shared_storage)
    }

    pub fn data_exchange(&self) -> Option<Arc<dyn dataexchange::Plugin>> {
        first(&self.data_exchange)
    }

    /// Instance names per category, for logs and `check-config`.
    pub fn summary(&self) -> Vec<(PluginCategory, Vec<String>)> {
        fn names<P: ?Sized>(registered: &Registered<P>) -> Vec<String> {
            registered.iter().map(|(name, _)| name.clone()).collect()
        }
        vec![
            (PluginCategory::Database, names(&self.database)),
            (PluginCategory::Identity, names(&self.identity)),
            (PluginCategory::Blockchain, names(&self.blockchain)),
            (PluginCategory::SharedStorage, names(&self.shared_storage)),
            (PluginCategory::DataExchange, names(&self.data_exchange)),
            (PluginCategory::Tokens, names(&self.tokens)),
        ]
    }

    /// `wait_stop` of every plugin that runs background work.
    pub fn stop_futures(&self) -> Vec<BoxFuture<'_, ()>> {
        let mut stops = Vec::with_capacity(self.blockchain.len() + self.tokens.len());
        for (_, plugin) in &self.blockchain {
            stops.push(plugin.wait_stop());
        }
        for (_, plugin) in &self.tokens {
            stops.push(plugin.wait_stop());
        }
        stops
    }

    /// Runs the plugin layer.
    ///
    /// # Arguments
    ///
    /// * `config` - Node configuration the descriptors are read from
    /// * `factories` - Constructors for every known plugin type
    /// * `cancel` - Root token; every `init` is raced against it and each
    ///   plugin gets a child of it
    /// * `metrics` - Handle given to blockchain plugins
    /// * `callbacks` - Event sink given to event-producing plugins
    ///
    /// # Returns
    ///
    /// The registry, or the first error. Plugins initialized before the
    /// failure are dropped without being started.
    pub async fn init(
        config: &Config,
        factories: &Factories,
        cancel: &CancellationToken,
        metrics: Arc<dyn Metrics>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Result<Self, CoreError> {
        let mut plugins = Self::default();

        for (descriptor, mut plugin) in
            instantiate(&factories.database, load_plugins(config, PluginCategory::Database)?)?
        {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            guarded(cancel, plugin.init(&ctx, &handle)).await?;
            register(&mut plugins.database, descriptor, plugin);
        }

        let mut identities = load_plugins(config, PluginCategory::Identity)?;
        if identities.is_empty() {
            identities.push(PluginDescriptor::synthesized(
                PluginCategory::Identity,
                "onchain",
                ScopedConfig::empty("identity.onchain"),
            ));
        }
        if plugins.database.is_empty() {
            return Err(CoreError::NoDatabase {
                component: PluginCategory::Identity.to_string(),
            });
        }
        for (descriptor, mut plugin) in instantiate(&factories.identity, identities)? {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            guarded(cancel, plugin.init(&ctx, &handle)).await?;
            register(&mut plugins.identity, descriptor, plugin);
        }

        for (descriptor, mut plugin) in instantiate(
            &factories.blockchain,
            load_plugins(config, PluginCategory::Blockchain)?,
        )? {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            let init = plugin.init(
                &ctx,
                &handle,
                Arc::clone(&metrics),
                Arc::clone(&callbacks),
            );
            guarded(cancel, init).await?;
            register(&mut plugins.blockchain, descriptor, plugin);
        }
        plugins.bind_identities();

        for (descriptor, mut plugin) in instantiate(
            &factories.shared_storage,
            load_plugins(config, PluginCategory::SharedStorage)?,
        )? {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            let init = plugin.init(&ctx, &handle, Arc::clone(&callbacks));
            guarded(cancel, init).await?;
            register(&mut plugins.shared_storage, descriptor, plugin);
        }

        plugins
            .init_data_exchange(config, factories, cancel, &callbacks)
            .await?;

        for (descriptor, mut plugin) in
            instantiate(&factories.tokens, load_plugins(config, PluginCategory::Tokens)?)?
        {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            let init = plugin.init(&ctx, &handle, Arc::clone(&callbacks));
            guarded(cancel, init).await?;
            register(&mut plugins.tokens, descriptor, plugin);
        }

        for (category, names) in plugins.summary() {
            if !names.is_empty() {
                info!(category = category.as_str(), plugins = ?names, "Plugins initialized");
            }
        }
        Ok(plugins)
    }

    /// Points every identity plugin at the first blockchain.
    fn bind_identities(&self) {
        let Some(chain) = self.blockchain() else {
            return;
        };
        if self.blockchain.len() > 1 {
            warn!(
                blockchain = %self.blockchain[0].0,
                "Multiple blockchain plugins configured; identity plugins use the first"
            );
        }
        for (name, plugin) in &self.identity {
            plugin.bind_blockchain(Arc::clone(&chain));
            debug!(identity = %name, blockchain = %self.blockchain[0].0, "Identity plugin bound");
        }
    }

    /// Data exchange is optional unless node identities are already
    /// registered, in which case a default `ffdx` instance is added.
    async fn init_data_exchange(
        &mut self,
        config: &Config,
        factories: &Factories,
        cancel: &CancellationToken,
        callbacks: &Arc<dyn Callbacks>,
    ) -> Result<(), CoreError> {
        let nodes = match self.database() {
            Some(db) => {
                let (nodes, _) = db
                    .get_identities(&IdentityFilter::by_type(IdentityType::Node))
                    .await?;
                nodes.into_iter().map(|node| node.profile).collect()
            }
            None => Vec::new(),
        };

        let mut descriptors = load_plugins(config, PluginCategory::DataExchange)?;
        if descriptors.is_empty() {
            if nodes.is_empty() {
                debug!("No data exchange configured");
                return Ok(());
            }
            info!(nodes = nodes.len(), "Node identities registered; adding default data exchange");
            descriptors.push(PluginDescriptor::synthesized(
                PluginCategory::DataExchange,
                "ffdx",
                ScopedConfig::empty("dataexchange.ffdx"),
            ));
        }

        for (descriptor, mut plugin) in instantiate(&factories.data_exchange, descriptors)? {
            let (ctx, handle) = (context(&descriptor, cancel), descriptor.config.handle());
            let init = plugin.init(
                &ctx,
                &handle,
                nodes.clone(),
                Arc::clone(callbacks),
            );
            guarded(cancel, init).await?;
            register(&mut self.data_exchange, descriptor, plugin);
        }
        Ok(())
    }
}

fn instantiate<P: ?Sized>(
    factory: &Factory<P>,
    descriptors: Vec<PluginDescriptor>,
) -> Result<Vec<(PluginDescriptor, Box<P>)>, CoreError> {
    descriptors
        .into_iter()
        .map(|descriptor| {
            let plugin = factory.instantiate(&descriptor)?;
            Ok((descriptor, plugin))
        })
        .collect()
}

fn context(descriptor: &PluginDescriptor, cancel: &CancellationToken) -> PluginContext {
    PluginContext::new(descriptor.name.clone(), cancel.child_token())
}

fn register<P: ?Sized>(registry: &mut Registered<P>, descriptor: PluginDescriptor, plugin: Box<P>) {
    debug!(plugin = %descriptor.name, plugin_type = %descriptor.plugin_type, "Plugin registered");
    registry.push((descriptor.name, Arc::from(plugin)));
}

/// Runs `init` unless the root token fires first.
async fn guarded<F>(cancel: &CancellationToken, init: F) -> Result<(), CoreError>
where
    F: Future<Output = Result<(), CoreError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        result = init => result,
    }
}
