//! Port interface for the durable key/value primitive behind the cache

use async_trait::async_trait;
use tether_domain::Result;

/// Byte-oriented persistent storage
#[async_trait]
pub trait DurableKv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`; missing keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
