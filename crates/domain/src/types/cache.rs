//! Cache entry and cache policy types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::http::{ApiResponse, Headers};

/// How the cache strategy engine arbitrates between cache and network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Always fetch; write successes to cache; never read
    NetworkOnly,
    /// Serve from cache when present, otherwise fetch
    CacheFirst,
    /// Fetch when online, fall back to cache on failure or when offline
    NetworkFirst,
    /// Serve from cache only, never touch the network
    CacheOnly,
    /// Serve cache immediately and refresh it in the background
    StaleWhileRevalidate,
}

/// Strategy plus the max age applied to every cache write it performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub strategy: CacheStrategy,
    /// `None` means entries never expire by time
    pub max_age: Option<Duration>,
}

impl CachePolicy {
    pub fn new(strategy: CacheStrategy, max_age: Option<Duration>) -> Self {
        Self { strategy, max_age }
    }

    pub fn network_only(max_age: Option<Duration>) -> Self {
        Self::new(CacheStrategy::NetworkOnly, max_age)
    }

    pub fn cache_first(max_age: Option<Duration>) -> Self {
        Self::new(CacheStrategy::CacheFirst, max_age)
    }

    pub fn network_first(max_age: Option<Duration>) -> Self {
        Self::new(CacheStrategy::NetworkFirst, max_age)
    }

    pub fn cache_only() -> Self {
        Self::new(CacheStrategy::CacheOnly, None)
    }

    pub fn stale_while_revalidate(max_age: Option<Duration>) -> Self {
        Self::new(CacheStrategy::StaleWhileRevalidate, max_age)
    }
}

/// Snapshot of a successful response stored under a cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub status_code: u16,
    pub headers: Headers,
    pub stored_at_ms: i64,
    /// `None` means manual invalidation only
    pub max_age_ms: Option<i64>,
}

impl CacheEntry {
    /// Build an entry from a response stored at `now_ms`
    pub fn from_response(
        key: impl Into<String>,
        response: &ApiResponse,
        now_ms: i64,
        max_age: Option<Duration>,
    ) -> Self {
        Self {
            key: key.into(),
            payload: response.body.clone(),
            status_code: response.status,
            headers: response.headers.clone(),
            stored_at_ms: now_ms,
            max_age_ms: max_age.map(|age| i64::try_from(age.as_millis()).unwrap_or(i64::MAX)),
        }
    }

    /// An entry is logically absent once `now - stored_at > max_age`
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.max_age_ms {
            Some(max_age) => now_ms.saturating_sub(self.stored_at_ms) > max_age,
            None => false,
        }
    }

    /// Rebuild the response this entry was created from
    pub fn to_response(&self) -> ApiResponse {
        ApiResponse {
            status: self.status_code,
            headers: self.headers.clone(),
            body: self.payload.clone(),
            from_cache: true,
        }
    }
}
