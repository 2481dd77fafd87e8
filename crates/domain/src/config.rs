//! Configuration structures
//!
//! Every section has defaults so a partial TOML/JSON file (or none at all)
//! produces a usable configuration. Loading lives in `tether-infra`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COMPRESSION_THRESHOLD_BYTES, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REFRESH_THRESHOLD_SECS,
    DEFAULT_TIMEOUT_MS,
};
use crate::errors::TetherError;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub cache: CacheSettings,
    pub pipeline: PipelineConfig,
    pub connectivity: ConnectivityConfig,
}

impl TetherConfig {
    /// Reject configurations that cannot produce a working client
    ///
    /// # Errors
    /// Returns `TetherError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.api.base_url.trim().is_empty() {
            return Err(TetherError::Config("api.base_url must not be empty".into()));
        }
        if self.api.timeout_ms == 0 {
            return Err(TetherError::Config("api.timeout_ms must be greater than zero".into()));
        }
        if self.auth.refresh_threshold_secs < 0 {
            return Err(TetherError::Config(
                "auth.refresh_threshold_secs must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Backend endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Authentication endpoints and credential storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub refresh_path: String,
    pub login_path: String,
    pub keychain_service: String,
    pub keychain_account: String,
    /// Tokens expiring within this many seconds are treated as expired
    pub refresh_threshold_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/auth/login".to_string(),
            keychain_service: "Tether.api".to_string(),
            keychain_account: "main".to_string(),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
        }
    }
}

/// Response cache storage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// SQLite file backing the cache; in-memory when absent
    pub db_path: Option<String>,
    /// Max age used by [`CachePolicy`](crate::CachePolicy) helpers when
    /// callers do not pass one
    pub default_max_age_ms: Option<u64>,
}

impl CacheSettings {
    pub fn default_max_age(&self) -> Option<Duration> {
        self.default_max_age_ms.map(Duration::from_millis)
    }
}

/// Request pipeline behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bodies larger than this receive compression hints
    pub compression_threshold_bytes: usize,
    /// Gzip-encode bodies above the threshold
    pub compress_request_bodies: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            compress_request_bodies: false,
        }
    }
}

/// Reachability probing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL probed with `HEAD`; connectivity is assumed when absent
    pub probe_url: Option<String>,
    pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self { probe_url: None, probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS }
    }
}
