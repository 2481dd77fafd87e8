//! # Tether Core
//!
//! Resilience logic of the API-access layer, free of infrastructure.
//!
//! This crate contains:
//! - Port interfaces (traits) for transport, credentials, identities,
//!   connectivity and durable storage
//! - The error classifier
//! - The response cache and its strategy engine
//! - The single-flight refresh coordinator
//! - The request pipeline composing all of the above
//!
//! ## Architecture Principles
//! - Only depends on `tether-common` and `tether-domain`
//! - No HTTP, database or keychain code
//! - All external collaborators via traits

pub mod auth;
pub mod cache;
pub mod classifier;
pub mod http;

pub use auth::{
    AuthBackend, CredentialStore, IdentityStore, MemoryCredentialStore, MemoryIdentityStore,
    RefreshCoordinator, RefreshCoordinatorBuilder,
};
pub use cache::{
    CacheInvalidation, CacheKey, CacheStore, CacheStrategyEngine, DurableKv, MemoryKv,
};
pub use classifier::{classify, classify_failure, classify_response, TransportOutcome};
pub use http::{ConnectivityProbe, PipelineSettings, RequestPipeline, ToggleConnectivity, Transport};
