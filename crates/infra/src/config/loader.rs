//! Configuration loader
//!
//! Loads [`TetherConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. A `.env` file, if present, is merged into the process environment
//! 2. Environment variables are used when `TETHER_API_BASE_URL` is set
//! 3. Otherwise the first config file found by [`probe_config_paths`] is read
//! 4. JSON and TOML are supported; missing sections take their defaults
//!
//! ## Environment Variables
//! - `TETHER_API_BASE_URL`: Backend base URL (required for env loading)
//! - `TETHER_API_TIMEOUT_MS`: Default request timeout
//! - `TETHER_API_USER_AGENT`: User agent sent with every request
//! - `TETHER_AUTH_REFRESH_PATH` / `TETHER_AUTH_LOGIN_PATH`: Token endpoints
//! - `TETHER_KEYCHAIN_SERVICE` / `TETHER_KEYCHAIN_ACCOUNT`: Keychain entry
//! - `TETHER_REFRESH_THRESHOLD_SECS`: Early-refresh window
//! - `TETHER_CACHE_DB_PATH`: SQLite cache file (in-memory when unset)
//! - `TETHER_CACHE_MAX_AGE_MS`: Default cache max age
//! - `TETHER_COMPRESSION_THRESHOLD`: Body size triggering compression hints
//! - `TETHER_COMPRESS_REQUESTS`: Gzip large request bodies (true/false)
//! - `TETHER_CONNECTIVITY_PROBE_URL`: URL probed with `HEAD`
//! - `TETHER_CONNECTIVITY_PROBE_TIMEOUT_MS`: Probe timeout
//!
//! ## File Locations
//! The loader probes `tether.toml`, `tether.json`, `config.toml` and
//! `config.json` in the current directory and up to two parents, then next
//! to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tether_domain::{Result, TetherConfig, TetherError};

const CONFIG_FILE_NAMES: [&str; 4] = ["tether.toml", "tether.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TetherError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<TetherConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to read .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `TETHER_API_BASE_URL` is required; every other variable overrides
/// the corresponding default when set.
///
/// # Errors
/// Returns `TetherError::Config` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<TetherConfig> {
    let mut config = TetherConfig::default();

    config.api.base_url = env_var("TETHER_API_BASE_URL")?;
    if let Some(timeout) = env_parse("TETHER_API_TIMEOUT_MS")? {
        config.api.timeout_ms = timeout;
    }
    config.api.user_agent = std::env::var("TETHER_API_USER_AGENT").ok();

    if let Ok(path) = std::env::var("TETHER_AUTH_REFRESH_PATH") {
        config.auth.refresh_path = path;
    }
    if let Ok(path) = std::env::var("TETHER_AUTH_LOGIN_PATH") {
        config.auth.login_path = path;
    }
    if let Ok(service) = std::env::var("TETHER_KEYCHAIN_SERVICE") {
        config.auth.keychain_service = service;
    }
    if let Ok(account) = std::env::var("TETHER_KEYCHAIN_ACCOUNT") {
        config.auth.keychain_account = account;
    }
    if let Some(threshold) = env_parse("TETHER_REFRESH_THRESHOLD_SECS")? {
        config.auth.refresh_threshold_secs = threshold;
    }

    config.cache.db_path = std::env::var("TETHER_CACHE_DB_PATH").ok();
    config.cache.default_max_age_ms = env_parse("TETHER_CACHE_MAX_AGE_MS")?;

    if let Some(threshold) = env_parse("TETHER_COMPRESSION_THRESHOLD")? {
        config.pipeline.compression_threshold_bytes = threshold;
    }
    config.pipeline.compress_request_bodies = env_bool("TETHER_COMPRESS_REQUESTS", false);

    config.connectivity.probe_url = std::env::var("TETHER_CONNECTIVITY_PROBE_URL").ok();
    if let Some(timeout) = env_parse("TETHER_CONNECTIVITY_PROBE_TIMEOUT_MS")? {
        config.connectivity.probe_timeout_ms = timeout;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `TetherError::Config` if the file is missing, cannot be parsed or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<TetherConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TetherError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TetherError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TetherError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<TetherConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TetherError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TetherError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TetherError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first existing candidate.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| TetherError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional variable, failing on malformed values
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TetherError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
