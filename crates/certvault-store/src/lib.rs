//! Certificate storage engine for certvault
//!
//! This crate provides:
//! - A narrow key/value storage contract and an in-memory backend
//! - TTL caches for parsed certificates and public-key fingerprints
//! - The certificate manager: ingestion, batch resolution, listing, deletion
//! - Trust pool construction and allow-list peer validation
//!
//! # Architecture
//!
//! ```text
//!        add / list / delete                 validate_peer / cert_pool
//!               │                                      │
//!               ▼                                      ▼
//!      ┌──────────────────────────────────────────────────────┐
//!      │                 CertificateManager                   │
//!      │   ┌──────────────────┐    ┌───────────────────────┐  │
//!      │   │ CertificateCache │    │ certvault-cert parser │  │
//!      │   └──────────────────┘    └───────────────────────┘  │
//!      └──────────────┬──────────────────────────┬────────────┘
//!                     ▼                          ▼
//!             StorageHandler               local filesystem
//! ```

pub mod cache;
pub mod manager;
pub mod metrics;
pub mod storage;
pub mod trust;

pub use cache::{CertificateCache, TtlCache};
pub use manager::{CertificateManager, Resolution};
pub use metrics::{ManagerMetrics, MetricsSnapshot};
pub use storage::{MemoryStorage, StorageHandler};
pub use trust::PeerHandshake;
