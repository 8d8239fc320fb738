//! # certvault core
//!
//! Error taxonomy, configuration and logging setup shared by the certvault
//! crates.
//!
//! - **Errors**: `thiserror` enums for ingestion, storage, trust and
//!   configuration failures, serializable for API responses.
//! - **Configuration**: YAML-backed settings with environment overrides
//!   and validation.
//! - **Logging**: `tracing-subscriber` initialisation in text or JSON form.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheConfig, CertVaultConfig, TrustPolicy};
pub use error::{CertVaultError, CertificateError, Result, StorageError, TrustError};
