//! certvault - content-addressed certificate store
//!
//! Ingests PEM bundles (certificate chains with an optional private key, or
//! standalone public keys), stores them under identifiers derived from their
//! SHA-256 fingerprint, and resolves allow-lists of identifiers into trust
//! anchors and peer certificate checks for TLS servers.
//!
//! The work is split across three crates, re-exported here:
//! - [`core`]: errors, configuration, logging
//! - [`cert`]: PEM classification, key codecs, fingerprints
//! - [`store`]: storage contract, caches, the certificate manager

pub use certvault_cert as cert;
pub use certvault_core as core;
pub use certvault_store as store;

pub use certvault_cert::{CertificateMeta, CertificateMode, ParsedCertificate};
pub use certvault_core::{CertVaultConfig, CertVaultError, Result, TrustPolicy};
pub use certvault_store::{
    CertificateManager, MemoryStorage, PeerHandshake, Resolution, StorageHandler,
};
