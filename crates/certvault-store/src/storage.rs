//! Persistent store collaborator.
//!
//! The engine only needs a narrow key/value contract from its backend:
//! whole-record reads and writes, glob listing and deletion. Backends are
//! shared across request handlers, so implementations must be `Send + Sync`.

use async_trait::async_trait;
use certvault_core::error::StorageError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Key/value backend holding raw certificate bundles.
#[async_trait]
pub trait StorageHandler: Send + Sync {
    /// Reads the value under `key`, or `StorageError::NotFound`.
    async fn get_key(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Writes `value` under `key`. A `ttl_secs` of 0 never expires.
    async fn set_key(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StorageError>;

    /// Writes `value` only if `key` holds nothing, returning whether it was
    /// written.
    ///
    /// The default implementation is a separate read and write and is not
    /// atomic; backends with a conditional write should override it.
    async fn set_key_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StorageError> {
        match self.get_key(key).await {
            Ok(existing) if !existing.is_empty() => return Ok(false),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.set_key(key, value, ttl_secs).await?;
        Ok(true)
    }

    /// Lists keys matching a glob pattern (`*` and `?` wildcards).
    async fn get_keys(&self, pattern: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes `key`, returning whether anything was removed.
    async fn delete_key(&self, key: &str) -> bool;

    /// Deletes every key matching a glob pattern.
    async fn delete_matching(&self, pattern: &str) -> bool;
}

/// Compiles a glob pattern into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, StorageError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| StorageError::backend(format!("invalid pattern {}: {}", pattern, e)))
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &[u8], ttl_secs: u64) -> Self {
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));
        Self {
            value: value.to_vec(),
            expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process backend built on a concurrent map.
///
/// Suitable for tests and single-node deployments; records are lost when
/// the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, including ones whose TTL has lapsed but
    /// that haven't been read since.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageHandler for MemoryStorage {
    async fn get_key(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(stored) if !stored.is_expired(now) => return Ok(stored.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, stored| stored.is_expired(now));
        }
        Err(StorageError::not_found(key))
    }

    async fn set_key(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StorageError> {
        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl_secs));
        Ok(())
    }

    async fn set_key_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StorageError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_expired(now) => {
                occupied.insert(StoredValue::new(value, ttl_secs));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl_secs));
                Ok(true)
            }
        }
    }

    async fn get_keys(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();

        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now) && matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_key(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn delete_matching(&self, pattern: &str) -> bool {
        let Ok(matcher) = glob_to_regex(pattern) else {
            return false;
        };

        let before = self.entries.len();
        self.entries.retain(|key, _| !matcher.is_match(key));
        let removed = before.saturating_sub(self.entries.len());

        debug!(pattern, removed, "Deleted matching keys");
        removed > 0
    }
}
