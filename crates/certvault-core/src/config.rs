//! Configuration for the certvault certificate store.
//!
//! Settings can be loaded from YAML files, layered with environment variable
//! overrides through the `config` crate, and validated before the engine is
//! constructed.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Root configuration for a certificate manager instance.
///
/// # Examples
///
/// ```
/// use certvault_core::config::CertVaultConfig;
///
/// let config = CertVaultConfig::from_yaml("secret: s3cr3t").unwrap();
/// assert_eq!(config.storage.key_prefix, "raw-");
/// config.validate().unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct CertVaultConfig {
    /// Manager-wide passphrase used to encrypt private keys at rest
    #[serde(default)]
    pub secret: String,

    /// Persistent store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// In-memory cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Peer validation settings
    #[serde(default)]
    pub trust: TrustConfig,

    /// Identifier resolution settings
    #[serde(default)]
    pub identifiers: IdentifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl fmt::Debug for CertVaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertVaultConfig")
            .field("secret", &"[REDACTED]")
            .field("storage", &self.storage)
            .field("cache", &self.cache)
            .field("trust", &self.trust)
            .field("identifiers", &self.identifiers)
            .field("logging", &self.logging)
            .finish()
    }
}

impl Default for CertVaultConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            trust: TrustConfig::default(),
            identifiers: IdentifierConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CertVaultConfig {
    /// Creates a default configuration using `secret` as the at-rest passphrase.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: the YAML file at `path`
    /// overridden by `CERTVAULT__*` environment variables
    /// (e.g. `CERTVAULT__CACHE__CERTIFICATE_TTL_SECS=60`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("CERTVAULT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty secret, an empty storage key prefix,
    /// zero cache intervals or an unparseable log level.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(ConfigError::invalid_value("secret", "Secret cannot be empty").into());
        }

        if self.storage.key_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.key_prefix",
                "Key prefix cannot be empty",
            )
            .into());
        }

        self.cache.validate()?;
        self.logging.parse_level()?;

        Ok(())
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Marker prepended to every key written by the engine
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "raw-".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

/// Cache lifetimes. The fingerprint TTL also bounds how long a deleted
/// record's fingerprint can still be served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of parsed certificate entries in seconds
    #[serde(default = "default_ttl")]
    pub certificate_ttl_secs: u64,

    /// Lifetime of public-key fingerprint entries in seconds
    #[serde(default = "default_ttl")]
    pub fingerprint_ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            certificate_ttl_secs: default_ttl(),
            fingerprint_ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// Returns the certificate entry lifetime as a Duration.
    pub fn certificate_ttl(&self) -> Duration {
        Duration::from_secs(self.certificate_ttl_secs)
    }

    /// Returns the fingerprint entry lifetime as a Duration.
    pub fn fingerprint_ttl(&self) -> Duration {
        Duration::from_secs(self.fingerprint_ttl_secs)
    }

    /// Returns the sweep interval as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("cache.certificate_ttl_secs", self.certificate_ttl_secs),
            ("cache.fingerprint_ttl_secs", self.fingerprint_ttl_secs),
            ("cache.sweep_interval_secs", self.sweep_interval_secs),
        ];

        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "Must be greater than 0").into());
            }
        }

        Ok(())
    }
}

/// What to do when an allow-list entry cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// An unresolvable entry accepts any peer
    #[default]
    FailOpen,
    /// Unresolvable entries are ignored; only fingerprint matches accept
    FailClosed,
}

/// Peer validation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub policy: TrustPolicy,
}

/// Identifier resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Resolve identifiers that are not content identifiers as local paths.
    ///
    /// When disabled, path entries in an allow-list are skipped and never
    /// trigger fail-open acceptance.
    #[serde(default = "default_true")]
    pub allow_filesystem_paths: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            allow_filesystem_paths: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Whether to include file/line info
    #[serde(default)]
    pub file_line: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}
