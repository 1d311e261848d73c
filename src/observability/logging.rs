//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` directives are honoured
//! on top of the configured level.

use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::observability::config::{LogConfig, LogFormat};

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the global subscriber
///
/// Returns `false` when a subscriber was already installed (tests, embedding
/// applications); the existing one is kept.
pub fn init_logging(config: &LogConfig, service_name: &str) -> bool {
    let env_filter = EnvFilter::from_default_env().add_directive(parse_level(&config.level).into());

    let installed = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok(),
    };

    if installed {
        info!(service = %service_name, level = %config.level, "Structured logging initialized");
    } else {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }

    installed
}
