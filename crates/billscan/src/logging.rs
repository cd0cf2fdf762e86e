//! Process-wide tracing setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::BillscanError;

/// Installs the global subscriber and routes `log` records into it.
///
/// Output goes to stderr so command results on stdout stay machine-readable.
/// `RUST_LOG` overrides the configured filter. Fails if a global subscriber
/// is already set.
pub fn init(config: &LoggingConfig) -> Result<(), BillscanError> {
    let filter = build_filter(config)?;

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BillscanError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| BillscanError::Logging(e.to_string()))?;

    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, BillscanError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            BillscanError::Logging(format!("Invalid log filter '{}': {}", config.filter, e))
        }),
    }
}
