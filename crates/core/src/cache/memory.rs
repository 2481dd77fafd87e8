//! In-memory [`DurableKv`] used when no database path is configured and in
//! tests

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tether_domain::Result;

use super::ports::DurableKv;

/// Concurrent in-memory key/value store
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DurableKv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}
