//! In-process caches with per-entry expiry.
//!
//! Entries expire lazily on read. A background sweeper removes entries
//! nobody reads again; it only runs when the cache is created inside a
//! Tokio runtime and stops when the cache is dropped.

use certvault_cert::ParsedCertificate;
use certvault_core::config::CacheConfig;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{trace, warn};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type Entries<V> = DashMap<String, CacheEntry<V>>;

/// Concurrent string-keyed cache with a fixed time-to-live.
pub struct TtlCache<V> {
    name: &'static str,
    entries: Arc<Entries<V>>,
    ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache whose entries live for `ttl`. The sweeper runs every
    /// `sweep_interval`.
    pub fn new(name: &'static str, ttl: Duration, sweep_interval: Duration) -> Self {
        let entries = Arc::new(DashMap::new());
        let sweeper = spawn_sweeper(name, Arc::downgrade(&entries), sweep_interval);

        Self {
            name,
            entries,
            ttl,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Returns the value under `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                counter!("certvault_cache_hits_total", "cache" => self.name).increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        counter!("certvault_cache_misses_total", "cache" => self.name).increment(1);
        None
    }

    /// Inserts or replaces `key`, resetting its expiry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key.into(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry now and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, Instant::now())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a background sweeper is attached.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.lock().is_some()
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

fn purge<V>(entries: &Entries<V>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before.saturating_sub(entries.len())
}

fn spawn_sweeper<V>(
    name: &'static str,
    entries: Weak<Entries<V>>,
    interval: Duration,
) -> Option<JoinHandle<()>>
where
    V: Send + Sync + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(
            cache = name,
            "No Tokio runtime, expired entries are only removed when read"
        );
        return None;
    };

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        loop {
            ticker.tick().await;

            let Some(entries) = entries.upgrade() else {
                break;
            };
            let removed = purge(&entries, Instant::now());
            if removed > 0 {
                trace!(cache = name, removed, "Swept expired entries");
            }
        }
    }))
}

/// The two caches the certificate engine keeps.
///
/// Parsed bundles and public-key fingerprints live in separate maps so the
/// same identifier can be cached in both without colliding.
pub struct CertificateCache {
    certificates: TtlCache<Arc<ParsedCertificate>>,
    fingerprints: TtlCache<String>,
}

impl CertificateCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            certificates: TtlCache::new(
                "certificate",
                config.certificate_ttl(),
                config.sweep_interval(),
            ),
            fingerprints: TtlCache::new(
                "fingerprint",
                config.fingerprint_ttl(),
                config.sweep_interval(),
            ),
        }
    }

    /// Parsed bundles keyed by the caller's identifier.
    pub fn certificates(&self) -> &TtlCache<Arc<ParsedCertificate>> {
        &self.certificates
    }

    /// Hex fingerprints of the first PEM block, keyed by identifier.
    pub fn fingerprints(&self) -> &TtlCache<String> {
        &self.fingerprints
    }

    /// Empties both caches.
    pub fn flush(&self) {
        self.certificates.clear();
        self.fingerprints.clear();
    }
}
