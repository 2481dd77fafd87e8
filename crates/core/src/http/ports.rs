//! Port interfaces for sending requests
//!
//! These traits define the boundaries between the request pipeline and
//! infrastructure implementations.

use async_trait::async_trait;
use tether_domain::{ApiResponse, TransportFailure, TransportRequest};

/// Trait for the raw HTTP transport
///
/// Any response received, whatever its status, is `Ok`. `Err` means no
/// response arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure>;
}

/// Trait for querying network reachability
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}
