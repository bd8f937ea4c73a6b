//! End-to-end boot of a node built from the real plugins
//!
//! sqlite3 and filesystem storage run against a temporary directory. The
//! blockchain and token connectors point at a closed port: they initialize
//! from config alone and their event streams keep retrying in the
//! background until the node is stopped.

use ledgerlink_engine::config::{Config, PluginCategory};
use ledgerlink_engine::orchestrator::{Orchestrator, State};
use ledgerlink_engine::plugins::Factories;
use sdk::errors::ErrorExt;
use sdk::types::{NamespaceType, SYSTEM_NAMESPACE};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

fn node_config(dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[namespaces]
default = "ns1"
predefined = [{{ name = "ns1", description = "first" }}]

[[plugins.database]]
name = "db0"
type = "sqlite3"
[plugins.database.sqlite3]
url = "sqlite://{db}"

[[plugins.blockchain]]
name = "eth0"
type = "ethereum"
[plugins.blockchain.ethereum.ethconnect]
url = "http://127.0.0.1:1"
ws.reconnect_delay_ms = 50

[[plugins.sharedstorage]]
name = "fs0"
type = "filesystem"
[plugins.sharedstorage.filesystem]
path = "{storage}"

[[plugins.tokens]]
name = "erc1155"
type = "fftokens"
[plugins.tokens.fftokens]
url = "http://127.0.0.1:1"
ws.reconnect_delay_ms = 50
"#,
        db = dir.path().join("node.db").display(),
        storage = dir.path().join("payloads").display(),
    );
    let mut config = Config::from_toml_str(&toml).unwrap();
    config.validate_and_process().unwrap();
    config
}

async fn stop(node: &Orchestrator) {
    tokio::time::timeout(STOP_TIMEOUT, node.wait_stop())
        .await
        .expect("node did not stop in time");
}

#[tokio::test]
async fn boots_runs_and_stops() {
    let dir = TempDir::new().unwrap();
    let mut node = Orchestrator::new(node_config(&dir), Factories::builtin());

    node.init(CancellationToken::new()).await.unwrap();
    assert_eq!(node.state(), State::Ready);

    let summary = node.plugins().summary();
    let names = |category: PluginCategory| {
        summary
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, names)| names.clone())
            .unwrap_or_default()
    };
    assert_eq!(names(PluginCategory::Database), ["db0"]);
    assert_eq!(names(PluginCategory::Identity), ["identity_0"]);
    assert_eq!(names(PluginCategory::Tokens), ["erc1155"]);
    // No registered nodes yet, so no data exchange is synthesized
    assert!(names(PluginCategory::DataExchange).is_empty());

    let database = node.plugins().database().unwrap();
    let system = database.get_namespace(SYSTEM_NAMESPACE).await.unwrap().unwrap();
    assert_eq!(system.ns_type, NamespaceType::System);
    let ns1 = database.get_namespace("ns1").await.unwrap().unwrap();
    assert_eq!(ns1.description, "first");

    node.start().await.unwrap();
    assert_eq!(node.state(), State::Running);

    let nodes = node.network_map().unwrap().get_nodes().await.unwrap();
    assert!(nodes.is_empty());
    assert_eq!(node.assets().unwrap().connectors(), ["erc1155"]);

    stop(&node).await;
    assert_eq!(node.state(), State::Stopped);
    assert!(node.cancel_token().is_cancelled());

    // Second call returns straight away
    stop(&node).await;
}

#[tokio::test]
async fn reboot_keeps_namespace_identity() {
    let dir = TempDir::new().unwrap();

    let first_id = {
        let mut node = Orchestrator::new(node_config(&dir), Factories::builtin());
        node.init(CancellationToken::new()).await.unwrap();
        let id = node.namespaces()[1].id;
        let stored = node
            .plugins()
            .database()
            .unwrap()
            .get_namespace("ns1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        stop(&node).await;
        id
    };

    let mut config = node_config(&dir);
    config.namespaces.predefined[0].description = "renamed".into();
    let mut node = Orchestrator::new(config, Factories::builtin());
    node.init(CancellationToken::new()).await.unwrap();

    let stored = node
        .plugins()
        .database()
        .unwrap()
        .get_namespace("ns1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, first_id);
    assert_eq!(stored.description, "renamed");
    stop(&node).await;
}

#[tokio::test]
async fn connector_without_url_fails_init_and_stops() {
    let dir = TempDir::new().unwrap();
    let mut config = node_config(&dir);
    config.plugins.blockchain[0]["ethereum"] = serde_json::json!({ "ethconnect": {} });
    let mut node = Orchestrator::new(config, Factories::builtin());
    let err = node.init(CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.code(), "FF10138");
    assert_eq!(node.state(), State::Stopped);
    assert!(node.cancel_token().is_cancelled());
    stop(&node).await;
}

#[tokio::test]
async fn cancelled_token_aborts_init() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut node = Orchestrator::new(node_config(&dir), Factories::builtin());
    let err = node.init(cancel).await.unwrap_err();
    assert_eq!(err.code(), "FF00154");
    assert_eq!(node.state(), State::Stopped);
}
