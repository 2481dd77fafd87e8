//! Error classification shared by every Tether error type
//!
//! Error enums stay local to the crate that produces them; what they share is
//! the [`ErrorClassification`] trait, which lets the request pipeline, the
//! logging helpers and callers reason about any error uniformly:
//!
//! - **`is_retryable()`**: may the caller try again later?
//! - **`severity()`**: how loudly should this be logged?
//! - **`is_critical()`**: does this end the user's session or corrupt state?
//! - **`retry_after()`**: suggested delay, if the failure carries one
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Cache miss, offline with cached data |
//! | **Warning** | Degraded but operational | Timeouts, background refresh failures |
//! | **Error** | Failure requiring attention | Server errors, invalid input |
//! | **Critical** | Session or data integrity at risk | Re-authentication exhausted |
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_common::error::ErrorClassification;
//!
//! async fn with_retry<F, Fut, T, E>(mut operation: F) -> Result<T, E>
//! where
//!     F: FnMut() -> Fut,
//!     Fut: std::future::Future<Output = Result<T, E>>,
//!     E: ErrorClassification,
//! {
//!     let mut last = operation().await;
//!     for _ in 0..2 {
//!         match &last {
//!             Err(e) if e.is_retryable() => {
//!                 if let Some(delay) = e.retry_after() {
//!                     tokio::time::sleep(delay).await;
//!                 }
//!                 last = operation().await;
//!             }
//!             _ => break,
//!         }
//!     }
//!     last
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard classification interface for error types
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: timeouts, lost connectivity,
    /// temporary server unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
