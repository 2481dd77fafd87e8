//! SQLite-backed durable key/value store for the response cache

use std::path::Path;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tether_core::DurableKv;
use tether_domain::{Result, TetherError};
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
)";

const DEFAULT_POOL_SIZE: u32 = 4;

type SqlitePool = Pool<SqliteConnectionManager>;

/// [`DurableKv`] over a pooled SQLite database
#[derive(Clone)]
pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(())));
        let kv = Self::with_manager(manager, DEFAULT_POOL_SIZE)?;

        info!(db_path = %path.display(), "sqlite cache store opened");
        Ok(kv)
    }

    /// Private in-memory database; a single connection keeps it alive
    pub fn in_memory() -> Result<Self> {
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    fn with_manager(manager: SqliteConnectionManager, pool_size: u32) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| TetherError::from(InfraError::from(e)))?;

        let kv = Self { pool };
        kv.connection()?
            .execute_batch(SCHEMA_SQL)
            .map_err(|e| TetherError::from(InfraError::from(e)))?;
        Ok(kv)
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| InfraError::from(e).into())
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> std::result::Result<T, rusqlite::Error> + Send + 'static,
    {
        let kv = self.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let conn = kv.connection()?;
            op(&*conn).map_err(|e| InfraError::from(e).into())
        })
        .await
        .map_err(|e| TetherError::Internal(format!("sqlite task failed: {e}")))?
    }
}

#[async_trait]
impl DurableKv for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.query_row("SELECT value FROM cache_entries WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })
        .await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key]).map(|_| ())
        })
        .await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.blocking(move |conn| {
            // substr avoids LIKE wildcards in the prefix
            let mut stmt = conn.prepare(
                "SELECT key FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn values_survive_reopening_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        let kv = SqliteKv::open(&path).unwrap();
        kv.put("cache:a", b"one".to_vec()).await.unwrap();
        kv.put("cache:a", b"two".to_vec()).await.unwrap();
        drop(kv);

        let reopened = SqliteKv::open(&path).unwrap();
        assert_eq!(reopened.get("cache:a").await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn prefix_scan_treats_wildcards_literally() {
        let kv = SqliteKv::in_memory().unwrap();
        kv.put("cache:GET a", vec![1]).await.unwrap();
        kv.put("cache:GET b", vec![2]).await.unwrap();
        kv.put("cache_x", vec![3]).await.unwrap();
        kv.put("other", vec![4]).await.unwrap();

        assert_eq!(kv.keys_with_prefix("cache:").await.unwrap(), vec!["cache:GET a", "cache:GET b"]);
        assert!(kv.keys_with_prefix("cache%").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let kv = SqliteKv::in_memory().unwrap();
        kv.put("k", vec![1]).await.unwrap();

        kv.delete("k").await.unwrap();
        kv.delete("k").await.unwrap();

        assert!(kv.get("k").await.unwrap().is_none());
    }
}
