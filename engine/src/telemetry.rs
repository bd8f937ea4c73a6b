//! Telemetry and Observability
//!
//! Sets up `tracing-subscriber` for structured logging. The level comes from
//! `[log] level` in the config unless `RUST_LOG` says otherwise. Debug builds
//! print human-readable lines; release builds emit JSON with span context.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber at `log_level`.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter. Only the first call
/// in a process takes effect.
pub fn init_telemetry_with_level(log_level: &str) {
    let default_filter = format!("{},ledgerlink_engine={}", log_level, log_level);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}
