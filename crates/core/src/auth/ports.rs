//! Port interfaces for credentials and authentication

use async_trait::async_trait;
use tether_domain::{AppError, Credentials, Identity, Result};

/// Trait for the secure credential store
///
/// The store holds at most one credential pair and always writes both tokens
/// together.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(&self) -> Result<Option<Credentials>>;

    async fn write(&self, credentials: &Credentials) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Trait for the backend that issues credentials
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a refresh token for a new credential pair
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credentials, AppError>;

    /// Sign in again with a stored identity after refresh failed
    async fn reauthenticate(&self, identity: &Identity)
        -> std::result::Result<Credentials, AppError>;
}

/// Trait for the identity used by fallback re-authentication
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn read_identity(&self) -> Result<Option<Identity>>;

    /// Forget the identity on sign-out
    async fn clear_identity(&self) -> Result<()>;
}
