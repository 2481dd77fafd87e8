//! Credential persistence in the platform keychain
//!
//! The credential pair is stored as one JSON secret so that access and
//! refresh tokens are always written together.

use std::sync::Arc;

use async_trait::async_trait;
use keyring::Entry;
use tether_core::CredentialStore;
use tether_domain::{AuthConfig, Credentials, Result, TetherError};
use tracing::debug;

use crate::errors::InfraError;

/// [`CredentialStore`] backed by `keyring`
#[derive(Clone)]
pub struct KeychainCredentialStore {
    entry: Arc<Entry>,
    service: String,
}

impl std::fmt::Debug for KeychainCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainCredentialStore").field("service", &self.service).finish()
    }
}

impl KeychainCredentialStore {
    pub fn new(service: &str, account: &str) -> Result<Self> {
        let entry = Entry::new(service, account).map_err(|e| TetherError::from(InfraError::from(e)))?;
        Ok(Self { entry: Arc::new(entry), service: service.to_string() })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(&config.keychain_service, &config.keychain_account)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> Result<T> + Send + 'static,
    {
        let entry = self.entry.clone();
        tokio::task::spawn_blocking(move || op(&*entry))
            .await
            .map_err(|e| TetherError::Internal(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn read(&self) -> Result<Option<Credentials>> {
        debug!(service = %self.service, "reading credentials from keychain");

        self.blocking(|entry| match entry.get_password() {
            Ok(secret) => Ok(Some(serde_json::from_str(&secret)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        })
        .await
    }

    async fn write(&self, credentials: &Credentials) -> Result<()> {
        debug!(service = %self.service, "storing credentials in keychain");

        let secret = serde_json::to_string(credentials)?;
        self.blocking(move |entry| {
            entry.set_password(&secret).map_err(|e| InfraError::from(e).into())
        })
        .await
    }

    /// Idempotent: a missing entry is not an error
    async fn clear(&self) -> Result<()> {
        debug!(service = %self.service, "clearing credentials from keychain");

        self.blocking(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        })
        .await
    }
}
