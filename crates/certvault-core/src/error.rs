//! Error types for the certvault certificate store.
//!
//! Every failure the engine can surface is represented here. All errors
//! implement `std::error::Error` and are serializable so they can be handed
//! back verbatim in API responses by the surrounding service.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias using CertVaultError as the error type.
pub type Result<T> = std::result::Result<T, CertVaultError>;

/// Top-level error type for all certvault operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum CertVaultError {
    /// Ingestion, parsing and key handling errors
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// Persistent store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Peer validation errors
    #[error("Trust error: {0}")]
    Trust(#[from] TrustError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (filesystem identifiers)
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CertVaultError {
    /// Returns true if the error means the requested record does not exist,
    /// either in the persistent store or on the filesystem.
    pub fn is_not_found(&self) -> bool {
        match self {
            CertVaultError::Storage(err) => err.is_not_found(),
            CertVaultError::Io(err) => matches!(err.kind, IoErrorKind::NotFound),
            _ => false,
        }
    }
}

/// Errors raised while classifying, decoding and ingesting PEM material.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CertificateError {
    /// The input contains no decodable PEM structure
    #[error("Malformed PEM input: {reason}")]
    MalformedInput { reason: String },

    /// An encrypted PEM block could not be decrypted
    #[error("Failed to decrypt PEM block {index}: {reason}")]
    Decryption { index: usize, reason: String },

    /// Key material could not be encrypted for storage
    #[error("Failed to encrypt private key: {reason}")]
    Encryption { reason: String },

    /// PKCS#8 wrapper carries a key algorithm other than RSA or EC
    #[error("Unsupported private key type: {algorithm}")]
    UnsupportedKeyType { algorithm: String },

    /// None of the supported private key encodings matched
    #[error("Failed to parse private key")]
    KeyParse,

    /// More than one private key block in a bundle
    #[error("Found multiple private keys")]
    MultipleKeys,

    /// A certificate chain combined with a standalone public key
    #[error("Public keys can't be combined with certificates")]
    MixedContent,

    /// Neither certificates nor a public key were found
    #[error("No CERTIFICATE or PUBLIC KEY block found")]
    EmptyBundle,

    /// Private key does not belong to the leaf certificate
    #[error("Private key does not match the certificate: {reason}")]
    KeyMismatch { reason: String },

    /// A record with the derived identifier is already stored
    #[error("Certificate with {id} id already exists")]
    DuplicateCertificate { id: String },

    /// Organisation prefix that would turn identifiers into file paths
    #[error("Invalid organisation prefix {org_id:?}: path separators are not allowed")]
    InvalidOrgPrefix { org_id: String },

    /// A CERTIFICATE block holds DER that is not a valid X.509 certificate
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate { reason: String },
}

impl CertificateError {
    /// Creates a malformed input error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    /// Creates a decryption error for the block at `index`.
    pub fn decryption(index: usize, reason: impl Into<String>) -> Self {
        Self::Decryption {
            index,
            reason: reason.into(),
        }
    }

    /// Creates an encryption error.
    pub fn encryption(reason: impl Into<String>) -> Self {
        Self::Encryption {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported key type error.
    pub fn unsupported_key(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedKeyType {
            algorithm: algorithm.into(),
        }
    }

    /// Creates a key mismatch error.
    pub fn key_mismatch(reason: impl Into<String>) -> Self {
        Self::KeyMismatch {
            reason: reason.into(),
        }
    }

    /// Creates an invalid certificate error.
    pub fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            reason: reason.into(),
        }
    }
}

/// Errors reported by the persistent store collaborator.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageError {
    /// No record exists under the key
    #[error("Key not found: {key}")]
    NotFound { key: String },

    /// Generic backend failure, propagated verbatim
    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a backend failure error.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Returns true for missing records.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors raised while validating a TLS peer against an allow-list.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrustError {
    /// The connection did not complete a TLS handshake
    #[error("TLS not enabled")]
    NoTls,

    /// The handshake completed without a client certificate
    #[error("Client TLS certificate is required")]
    NoPeerCertificate,

    /// The presented certificate is not on the allow-list
    #[error("Certificate with SHA256 {fingerprint} not allowed")]
    UntrustedPeer { fingerprint: String },
}

/// Errors related to configuration.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Logging could not be initialised
    #[error("Failed to initialise logging: {reason}")]
    Logging { reason: String },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Wrapper for I/O errors to make them serializable.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("I/O error: {kind:?}: {message}")]
pub struct IoError {
    pub kind: IoErrorKind,
    pub message: String,
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        Self {
            kind: err.kind().into(),
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for CertVaultError {
    fn from(err: io::Error) -> Self {
        CertVaultError::Io(err.into())
    }
}

/// Serializable subset of std::io::ErrorKind relevant to file reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoErrorKind {
    NotFound,
    PermissionDenied,
    InvalidInput,
    InvalidData,
    TimedOut,
    Interrupted,
    UnexpectedEof,
    Other,
}

impl From<io::ErrorKind> for IoErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => IoErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => IoErrorKind::PermissionDenied,
            io::ErrorKind::InvalidInput => IoErrorKind::InvalidInput,
            io::ErrorKind::InvalidData => IoErrorKind::InvalidData,
            io::ErrorKind::TimedOut => IoErrorKind::TimedOut,
            io::ErrorKind::Interrupted => IoErrorKind::Interrupted,
            io::ErrorKind::UnexpectedEof => IoErrorKind::UnexpectedEof,
            _ => IoErrorKind::Other,
        }
    }
}
