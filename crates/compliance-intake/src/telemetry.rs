//! Tracing subscriber setup.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::IntakeError;

/// Installs the global subscriber and bridges `log` records into it.
///
/// `RUST_LOG` wins over `config.level`. Returns `Ok(false)` if a global
/// subscriber was already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, IntakeError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| IntakeError::Telemetry(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
    };
    if installed.is_err() {
        return Ok(false);
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }
    Ok(true)
}

/// The last path component, for log fields. Directories can carry user
/// names and site layout, so they are left out.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<unnamed>".to_string())
}
