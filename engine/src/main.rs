// Ledgerlink node
// Main entry point for the ledgerlink binary

use clap::Parser;
use ledgerlink_engine::cli::{Cli, Command};
use ledgerlink_engine::config::{load_plugins, Config, DescriptorSource, PluginCategory};
use ledgerlink_engine::orchestrator::Orchestrator;
use ledgerlink_engine::plugins::Factories;
use ledgerlink_engine::telemetry::init_telemetry_with_level;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    // --log wins over the config file
    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    init_telemetry_with_level(level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Ledgerlink v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Run => run(config).await,
        Command::CheckConfig => check_config(&config, cli.json),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    if let Some(path) = &cli.config {
        return Ok(Config::load_from_path(path)?);
    }
    let path = Config::default_config_path()?;
    if path.exists() {
        Ok(Config::load_from_path(&path)?)
    } else {
        let mut config = Config::default();
        config.validate_and_process()?;
        Ok(config)
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut node = Orchestrator::new(config, Factories::builtin());

    node.init(cancel.clone()).await?;
    node.start().await?;
    tracing::info!(state = %node.state(), "Node running, press Ctrl-C to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
        }
        _ = cancel.cancelled() => {
            tracing::warn!("Node cancelled itself");
        }
    }

    node.wait_stop().await;
    tracing::info!("Node stopped");
    Ok(())
}

fn source_label(source: DescriptorSource) -> &'static str {
    match source {
        DescriptorSource::Plugins => "plugins",
        DescriptorSource::Deprecated => "deprecated",
        DescriptorSource::Synthesized => "synthesized",
    }
}

fn check_config(config: &Config, as_json: bool) -> anyhow::Result<()> {
    let mut report = serde_json::Map::new();
    for category in PluginCategory::ALL {
        let descriptors = load_plugins(config, category)?;
        let entries: Vec<_> = descriptors
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "type": d.plugin_type,
                    "source": source_label(d.source),
                    "scope": d.config.scope(),
                })
            })
            .collect();
        report.insert(category.as_str().to_string(), entries.into());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Default namespace: {}", config.namespaces.default);
    for (category, entries) in &report {
        println!("{}:", category);
        let entries = entries.as_array().map(Vec::as_slice).unwrap_or_default();
        if entries.is_empty() {
            println!("  (none)");
        }
        for entry in entries {
            println!(
                "  {} [{}] from {}",
                entry["name"].as_str().unwrap_or_default(),
                entry["type"].as_str().unwrap_or_default(),
                entry["source"].as_str().unwrap_or_default()
            );
        }
    }
    Ok(())
}
