//! Component layer: construct the default managers and wire them together
//!
//! Managers are built leaves first so each constructor receives the peers it
//! uses. Every prerequisite in a manager's dependency list is checked before
//! it is built, whether or not the default implementation ends up using it,
//! so a node missing a plugin fails the same way regardless of which slots
//! are preset.

use super::callbacks::BoundCallbacks;
use super::plugins::Plugins;
use crate::components::{
    adminevents, assets, batch, batchpin, broadcast, contracts, data, definitions, events,
    identity, messaging, metrics, networkmap, operations, require, shareddownload, txhelper,
    Components, EventManager, MetricsManager,
};
use crate::config::Config;
use sdk::errors::CoreError;
use sdk::plugins::{blockchain, database, sharedstorage};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn database(plugins: &Plugins, component: &str) -> Result<Arc<dyn database::Plugin>, CoreError> {
    plugins.database().ok_or_else(|| CoreError::NoDatabase {
        component: component.to_string(),
    })
}

fn blockchain(plugins: &Plugins, component: &str) -> Result<Arc<dyn blockchain::Plugin>, CoreError> {
    require(&plugins.blockchain(), component, "blockchain")
}

fn shared_storage(
    plugins: &Plugins,
    component: &str,
) -> Result<Arc<dyn sharedstorage::Plugin>, CoreError> {
    require(&plugins.shared_storage(), component, "sharedstorage")
}

/// Fills the metrics slot if the caller did not preset it.
pub fn ensure_metrics(components: &mut Components, config: &Config) -> Arc<dyn MetricsManager> {
    let metrics = components
        .metrics
        .get_or_insert_with(|| metrics::Manager::new(config.metrics.enabled) as Arc<dyn MetricsManager>);
    Arc::clone(metrics)
}

/// Builds every empty slot in dependency order.
pub async fn init_components(
    components: &mut Components,
    plugins: &Plugins,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let metrics = ensure_metrics(components, config);
    let c = components;

    if c.tx_helper.is_none() {
        c.tx_helper = Some(txhelper::Manager::new(database(plugins, "txhelper")?));
    }

    if c.operations.is_none() {
        database(plugins, "operations")?;
        blockchain(plugins, "operations")?;
        require(&c.tx_helper, "operations", "txhelper")?;
        c.operations = Some(operations::Manager::new());
    }

    if c.identity.is_none() {
        let manager = identity::Manager::new(
            database(plugins, "identity")?,
            blockchain(plugins, "identity")?,
            plugins.identity(),
            config.org.key.clone(),
        )
        .await?;
        c.identity = Some(manager);
    }

    if c.data.is_none() {
        c.data = Some(data::Manager::new(database(plugins, "data")?));
    }

    if c.batch.is_none() {
        database(plugins, "batch")?;
        c.batch = Some(batch::Manager::new(
            cancel.child_token(),
            require(&c.data, "batch", "data")?,
            require(&c.tx_helper, "batch", "txhelper")?,
            config.batch.size,
            Duration::from_millis(config.batch.timeout_ms),
        ));
    }

    if c.batch_pin.is_none() {
        database(plugins, "batchpin")?;
        blockchain(plugins, "batchpin")?;
        c.batch_pin = Some(batchpin::Manager::new(
            require(&c.identity, "batchpin", "identity")?,
            require(&c.operations, "batchpin", "operations")?,
            Arc::clone(&metrics),
        ));
    }

    if c.messaging.is_none() {
        database(plugins, "messaging")?;
        require(&c.identity, "messaging", "identity")?;
        c.messaging = Some(messaging::Manager::new(
            require(&c.data, "messaging", "data")?,
            require(&c.batch, "messaging", "batch")?,
            plugins.data_exchange(),
            require(&c.batch_pin, "messaging", "batchpin")?,
            require(&c.operations, "messaging", "operations")?,
        ));
    }

    if c.broadcast.is_none() {
        database(plugins, "broadcast")?;
        require(&c.identity, "broadcast", "identity")?;
        c.broadcast = Some(broadcast::Manager::new(
            require(&c.data, "broadcast", "data")?,
            require(&c.batch, "broadcast", "batch")?,
            shared_storage(plugins, "broadcast")?,
            require(&c.batch_pin, "broadcast", "batchpin")?,
            require(&c.operations, "broadcast", "operations")?,
        ));
    }

    if c.assets.is_none() {
        database(plugins, "assets")?;
        require(&c.identity, "assets", "identity")?;
        require(&c.data, "assets", "data")?;
        require(&c.messaging, "assets", "messaging")?;
        c.assets = Some(assets::Manager::new(
            plugins.tokens.clone(),
            require(&c.broadcast, "assets", "broadcast")?,
            require(&c.tx_helper, "assets", "txhelper")?,
            require(&c.operations, "assets", "operations")?,
            Arc::clone(&metrics),
        ));
    }

    if c.contracts.is_none() {
        database(plugins, "contracts")?;
        blockchain(plugins, "contracts")?;
        require(&c.broadcast, "contracts", "broadcast")?;
        c.contracts = Some(contracts::Manager::new(
            require(&c.identity, "contracts", "identity")?,
            require(&c.tx_helper, "contracts", "txhelper")?,
            require(&c.operations, "contracts", "operations")?,
        ));
    }

    if c.definitions.is_none() {
        blockchain(plugins, "definitions")?;
        require(&c.data, "definitions", "data")?;
        require(&c.identity, "definitions", "identity")?;
        require(&c.broadcast, "definitions", "broadcast")?;
        require(&c.messaging, "definitions", "messaging")?;
        require(&c.assets, "definitions", "assets")?;
        c.definitions = Some(definitions::Manager::new(database(plugins, "definitions")?));
    }

    if c.shared_download.is_none() {
        database(plugins, "shareddownload")?;
        c.shared_download = Some(shareddownload::Manager::new(
            cancel.child_token(),
            shared_storage(plugins, "shareddownload")?,
            require(&c.operations, "shareddownload", "operations")?,
            config.download.workers,
        ));
    }

    if c.admin_events.is_none() {
        c.admin_events = Some(adminevents::Manager::new());
    }

    if c.events.is_none() {
        database(plugins, "events")?;
        blockchain(plugins, "events")?;
        require(&c.identity, "events", "identity")?;
        require(&c.data, "events", "data")?;
        require(&c.broadcast, "events", "broadcast")?;
        require(&c.messaging, "events", "messaging")?;
        require(&c.assets, "events", "assets")?;
        require(&c.operations, "events", "operations")?;
        require(&c.tx_helper, "events", "txhelper")?;
        c.events = Some(events::Manager::new(
            cancel.child_token(),
            require(&c.definitions, "events", "definitions")?,
            require(&c.shared_download, "events", "shareddownload")?,
            Arc::clone(&metrics),
            c.admin_events.clone(),
        ));
    }

    if c.network_map.is_none() {
        database(plugins, "networkmap")?;
        require(&c.broadcast, "networkmap", "broadcast")?;
        c.network_map = Some(networkmap::Manager::new(
            require(&c.identity, "networkmap", "identity")?,
            plugins.data_exchange(),
        ));
    }

    debug!(components = ?c.names(), "Components initialized");
    Ok(())
}

/// Second wiring phase: back-references that would otherwise form cycles.
pub fn wire_peers(components: &Components, callbacks: &BoundCallbacks) -> Result<(), CoreError> {
    let events: Arc<dyn EventManager> = require(&components.events, "orchestrator", "events")?;
    if !callbacks.bind(Arc::downgrade(&events)) {
        warn!("Plugin callbacks were already bound; keeping the existing event manager");
    }
    require(&components.shared_download, "orchestrator", "shareddownload")?
        .set_event_sink(Arc::downgrade(&events));
    Ok(())
}
