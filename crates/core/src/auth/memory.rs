//! In-process credential and identity stores
//!
//! Useful for hosts that persist credentials elsewhere and hand them to the
//! client at startup, and for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tether_domain::{Credentials, Identity, Result};

use super::ports::{CredentialStore, IdentityStore};

/// Credential store held in memory
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<RwLock<Option<Credentials>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { slot: Arc::new(RwLock::new(Some(credentials))) }
    }

    /// Replace the contents without going through the async port
    pub fn set(&self, credentials: Option<Credentials>) {
        *self.slot.write() = credentials;
    }

    /// Current contents without going through the async port
    pub fn snapshot(&self) -> Option<Credentials> {
        self.slot.read().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self) -> Result<Option<Credentials>> {
        Ok(self.snapshot())
    }

    async fn write(&self, credentials: &Credentials) -> Result<()> {
        *self.slot.write() = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write() = None;
        Ok(())
    }
}

/// Identity store held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    identity: Arc<RwLock<Option<Identity>>>,
}

impl MemoryIdentityStore {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity: Arc::new(RwLock::new(identity)) }
    }

    pub fn set(&self, identity: Option<Identity>) {
        *self.identity.write() = identity;
    }

    pub fn snapshot(&self) -> Option<Identity> {
        self.identity.read().clone()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn read_identity(&self) -> Result<Option<Identity>> {
        Ok(self.identity.read().clone())
    }

    async fn clear_identity(&self) -> Result<()> {
        *self.identity.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_slot_is_shared_between_clones() {
        let store = MemoryCredentialStore::new();
        let other = store.clone();

        store.write(&Credentials::new("at1", "rt1").unwrap()).await.unwrap();
        assert_eq!(other.read().await.unwrap().unwrap().access_token(), "at1");

        other.clear().await.unwrap();
        assert!(store.snapshot().is_none());
    }
}
