//! Metrics Collection
//!
//! Counts ingestion, retrieval failures and peer validation outcomes. Each
//! event is published through the `metrics` facade and also kept in a local
//! counter so callers can read a snapshot without installing an exporter.

use metrics::{counter, describe_counter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Manager metrics collector
#[derive(Debug)]
pub struct ManagerMetrics {
    certificates_added: AtomicU64,
    fetch_failures: AtomicU64,
    parse_failures: AtomicU64,
    peers_accepted: AtomicU64,
    peers_fail_open: AtomicU64,
    peers_rejected: AtomicU64,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        describe_counter!("certvault_certificates_added_total", "Total bundles ingested");
        describe_counter!(
            "certvault_fetch_failures_total",
            "Identifiers that could not be read from storage or disk"
        );
        describe_counter!(
            "certvault_parse_failures_total",
            "Stored bundles that could not be parsed"
        );
        describe_counter!(
            "certvault_peer_validations_total",
            "Peer validations by outcome"
        );

        Self {
            certificates_added: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            peers_accepted: AtomicU64::new(0),
            peers_fail_open: AtomicU64::new(0),
            peers_rejected: AtomicU64::new(0),
        }
    }

    pub fn record_certificate_added(&self) {
        self.certificates_added.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_certificates_added_total").increment(1);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_fetch_failures_total").increment(1);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_parse_failures_total").increment(1);
    }

    pub fn record_peer_accepted(&self) {
        self.peers_accepted.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_peer_validations_total", "outcome" => "accepted").increment(1);
    }

    /// A peer accepted only because an allow-list entry was unavailable.
    pub fn record_peer_fail_open(&self) {
        self.peers_fail_open.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_peer_validations_total", "outcome" => "fail_open").increment(1);
    }

    pub fn record_peer_rejected(&self) {
        self.peers_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("certvault_peer_validations_total", "outcome" => "rejected").increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            certificates_added: self.certificates_added.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            peers_accepted: self.peers_accepted.load(Ordering::Relaxed),
            peers_fail_open: self.peers_fail_open.load(Ordering::Relaxed),
            peers_rejected: self.peers_rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ManagerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub certificates_added: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,
    pub peers_accepted: u64,
    pub peers_fail_open: u64,
    pub peers_rejected: u64,
}
