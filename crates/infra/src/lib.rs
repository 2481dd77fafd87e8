//! # Tether Infrastructure
//!
//! Infrastructure implementations of the `tether-core` ports.
//!
//! This crate contains:
//! - The reqwest [`Transport`](tether_core::Transport) and HTTP connectivity
//!   probe
//! - The HTTP token backend and keychain credential store
//! - The SQLite key/value store behind the response cache
//! - Configuration loading and tracing setup
//! - The [`ApiClient`] facade wiring everything together
//!
//! ## Architecture
//! - Implements traits defined in `tether-core`
//! - Contains all "impure" code (network, disk, keychain)

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use auth::{HttpAuthBackend, KeychainCredentialStore};
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::InfraError;
pub use http::{HttpConnectivityProbe, ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_tracing, LogFormat};
pub use storage::SqliteKv;
