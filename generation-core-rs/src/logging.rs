//! Structured logging bootstrap
//!
//! Library code only emits `tracing` events. Binaries and tests that want to
//! see them call `init_logging` once.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::error::GenerationError;

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
    /// Service name attached to the startup record
    pub service_name: String,
    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "generation-core".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<(), GenerationError> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            LOGGING_INITIALIZED.store(false, Ordering::SeqCst);
            GenerationError::configuration(format!("Invalid log level '{}': {}", config.level, e))
        })?;

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(config.with_target)
    });
    let text_layer = (!config.json_format).then(|| fmt::layer().with_target(config.with_target));

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        GenerationError::configuration(format!("Failed to set global subscriber: {}", e))
    })?;

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = %config.json_format,
        "Structured logging initialized"
    );
    Ok(())
}
