//! Tracing subscriber initialisation driven by [`LoggingConfig`].

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ConfigError, Result};
use tracing_subscriber::EnvFilter;

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let level = config.parse_level()?;
    // RUST_LOG wins over the configured level when set
    Ok(EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())))
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the level is invalid or a global subscriber has
/// already been installed.
pub fn try_init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| {
        ConfigError::Logging {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Installs the global tracing subscriber, ignoring an already installed one.
pub fn init(config: &LoggingConfig) {
    if let Err(e) = try_init(config) {
        tracing::debug!("Logging already initialised: {}", e);
    }
}
