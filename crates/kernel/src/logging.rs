//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogTarget, LoggingConfig};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// The filter comes from `override_level` (command line flags), then
/// `RUST_LOG`, then the configured level. A log file that cannot be opened
/// falls back to stderr.
pub fn init_tracing(logging: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let filter = match override_level {
        Some(level) => EnvFilter::new(format!("{level},sqlx=warn")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = logging.level.as_deref().unwrap_or(DEFAULT_FILTER);
            EnvFilter::new(format!("{level},sqlx=warn"))
        }),
    };

    let mut file_error = None;
    let output: Option<Box<dyn Layer<Registry> + Send + Sync>> = match &logging.target {
        LogTarget::None => None,
        LogTarget::Stderr => Some(stderr_layer()),
        LogTarget::File(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .boxed(),
            ),
            Err(e) => {
                file_error = Some(format!("cannot open log file {}: {e}", path.display()));
                Some(stderr_layer())
            }
        },
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(e) = file_error {
        warn!("{e}, logging to stderr");
    }
    Ok(())
}

fn stderr_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .boxed()
}
