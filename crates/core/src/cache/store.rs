//! Response cache persisted in a [`DurableKv`]
//!
//! Entries are JSON documents stored under the `cache:` namespace. Reads
//! validate the document against the requested key; anything that fails to
//! decode, belongs to another key or has outlived its max age is evicted and
//! reported as a miss.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tether_common::time::{Clock, SystemClock};
use tether_common::utils::serde::base64_bytes;
use tether_domain::constants::CACHE_NAMESPACE;
use tether_domain::{CacheEntry, Headers, Result};
use tracing::{debug, warn};

use super::ports::DurableKv;

/// Rule selecting which cache entries to drop
#[derive(Debug, Clone)]
pub enum CacheInvalidation {
    /// Exactly this cache key
    Key(String),
    /// Every key matching the expression
    Pattern(Regex),
}

impl CacheInvalidation {
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Key(exact) => exact == key,
            Self::Pattern(pattern) => pattern.is_match(key),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    #[serde(with = "base64_bytes")]
    payload: Vec<u8>,
    status_code: u16,
    #[serde(default)]
    headers: Headers,
    stored_at_ms: i64,
    #[serde(default)]
    max_age_ms: Option<i64>,
}

impl From<&CacheEntry> for StoredEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            payload: entry.payload.clone(),
            status_code: entry.status_code,
            headers: entry.headers.clone(),
            stored_at_ms: entry.stored_at_ms,
            max_age_ms: entry.max_age_ms,
        }
    }
}

impl From<StoredEntry> for CacheEntry {
    fn from(stored: StoredEntry) -> Self {
        Self {
            key: stored.key,
            payload: stored.payload,
            status_code: stored.status_code,
            headers: stored.headers,
            stored_at_ms: stored.stored_at_ms,
            max_age_ms: stored.max_age_ms,
        }
    }
}

/// Key/value persistence with per-entry expiry
#[derive(Clone)]
pub struct CacheStore {
    kv: Arc<dyn DurableKv>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn DurableKv>) -> Self {
        Self { kv, clock: Arc::new(SystemClock) }
    }

    /// Judge expiry against `clock` instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time in epoch milliseconds, as seen by this store
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Fetch a live entry
    ///
    /// # Errors
    /// Returns the durable store's error if it cannot be read.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let storage_key = storage_key(key);
        let Some(bytes) = self.kv.get(&storage_key).await? else {
            return Ok(None);
        };

        let stored = match serde_json::from_slice::<StoredEntry>(&bytes) {
            Ok(stored) if stored.key == key => stored,
            Ok(stored) => {
                warn!(key, stored_key = %stored.key, "cache entry key mismatch; evicting");
                self.kv.delete(&storage_key).await?;
                return Ok(None);
            }
            Err(err) => {
                warn!(key, error = %err, "corrupt cache entry; evicting");
                self.kv.delete(&storage_key).await?;
                return Ok(None);
            }
        };

        let entry = CacheEntry::from(stored);
        if entry.is_expired(self.now_millis()) {
            debug!(key, "cache entry expired; evicting");
            self.kv.delete(&storage_key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Insert or overwrite the entry under its key
    ///
    /// # Errors
    /// Returns an error if the entry cannot be encoded or written.
    pub async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let bytes = serde_json::to_vec(&StoredEntry::from(entry))?;
        self.kv.put(&storage_key(&entry.key), bytes).await
    }

    /// Drop every entry matched by any rule, returning how many were removed
    ///
    /// # Errors
    /// Returns the durable store's error.
    pub async fn invalidate(&self, rules: &[CacheInvalidation]) -> Result<usize> {
        if rules.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for storage_key in self.kv.keys_with_prefix(CACHE_NAMESPACE).await? {
            let key = logical_key(&storage_key);
            if rules.iter().any(|rule| rule.matches(key)) {
                self.kv.delete(&storage_key).await?;
                removed += 1;
            }
        }

        debug!(removed, "cache invalidated");
        Ok(removed)
    }

    /// Drop every cache entry
    ///
    /// # Errors
    /// Returns the durable store's error.
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.kv.keys_with_prefix(CACHE_NAMESPACE).await?;
        for storage_key in &keys {
            self.kv.delete(storage_key).await?;
        }
        Ok(keys.len())
    }

    /// Remove expired and undecodable entries, returning how many were removed
    ///
    /// # Errors
    /// Returns the durable store's error.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.now_millis();
        let mut removed = 0;

        for storage_key in self.kv.keys_with_prefix(CACHE_NAMESPACE).await? {
            let Some(bytes) = self.kv.get(&storage_key).await? else {
                continue;
            };

            let stale = serde_json::from_slice::<StoredEntry>(&bytes)
                .map(|stored| CacheEntry::from(stored).is_expired(now))
                .unwrap_or(true);

            if stale {
                self.kv.delete(&storage_key).await?;
                removed += 1;
            }
        }

        debug!(removed, "expired cache entries purged");
        Ok(removed)
    }
}

fn storage_key(key: &str) -> String {
    format!("{CACHE_NAMESPACE}{key}")
}

fn logical_key(storage_key: &str) -> &str {
    storage_key.strip_prefix(CACHE_NAMESPACE).unwrap_or(storage_key)
}
