//! Key-value record store.
//!
//! Records are kept as JSON text under namespaced keys so the backing
//! database can be shared with unrelated data. The trait keeps the contract
//! backend-agnostic: anything with get/set/conditional-set/delete/scan
//! primitives can implement it. The default backend is SQLite (one table
//! used purely as a KV store); an in-memory implementation backs tests and
//! throwaway deployments.

use crate::models::record::Record;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

/// Prefix applied to every record key inside the backend.
pub const KEY_NAMESPACE: &str = "cdn:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("stored value for `{key}` is not a valid record: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("record failed to serialize: {0}")]
    Encode(serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend-agnostic record store. Keys passed in are bare; namespacing is
/// the implementation's concern. All operations are single-key atomic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record. An absent key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> StoreResult<Option<Record>>;

    /// Write a record unconditionally, replacing any previous value.
    async fn set(&self, key: &str, record: &Record) -> StoreResult<()>;

    /// Write a record only if the key is unused. Returns whether this call
    /// won the key. This is the primitive that makes key reservation safe
    /// against concurrent uploads.
    async fn set_if_absent(&self, key: &str, record: &Record) -> StoreResult<bool>;

    /// Remove a record. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Every stored `(key, record)` pair, keys bare. Values that fail to
    /// parse are skipped with a warning so one bad row cannot poison a
    /// retention sweep.
    async fn list_all(&self) -> StoreResult<Vec<(String, Record)>>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}

fn namespaced(key: &str) -> String {
    format!("{KEY_NAMESPACE}{key}")
}

fn encode(record: &Record) -> StoreResult<String> {
    serde_json::to_string(record).map_err(StoreError::Encode)
}

/// SQLite-backed store: a single `records(key, value)` table.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `url` and ensure the
    /// records table exists.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS records (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        let row = sqlx::query("SELECT value FROM records WHERE key = ?")
            .bind(namespaced(key))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let raw: String = row.get(0);
                serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|source| StoreError::Corrupt {
                        key: key.to_string(),
                        source,
                    })
            }
        }
    }

    async fn set(&self, key: &str, record: &Record) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO records (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(namespaced(key))
        .bind(encode(record)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, record: &Record) -> StoreResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO records (key, value) VALUES (?, ?)")
            .bind(namespaced(key))
            .bind(encode(record)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM records WHERE key = ?")
            .bind(namespaced(key))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<(String, Record)>> {
        let rows = sqlx::query("SELECT key, value FROM records WHERE key LIKE ?")
            .bind(format!("{KEY_NAMESPACE}%"))
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let full_key: String = row.get(0);
            let raw: String = row.get(1);
            let key = full_key[KEY_NAMESPACE.len()..].to_string();
            match serde_json::from_str(&raw) {
                Ok(record) => entries.push((key, record)),
                Err(err) => warn!("skipping unreadable record `{key}`: {err}"),
            }
        }
        Ok(entries)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory store used by tests and throwaway deployments. Values are kept
/// as serialized JSON so the round-trip semantics match the SQLite backend.
#[derive(Default)]
pub struct MemoryRecordStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        let entries = self.entries.read().await;
        match entries.get(&namespaced(key)) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    async fn set(&self, key: &str, record: &Record) -> StoreResult<()> {
        let raw = encode(record)?;
        self.entries.write().await.insert(namespaced(key), raw);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, record: &Record) -> StoreResult<bool> {
        let raw = encode(record)?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&namespaced(key)) {
            return Ok(false);
        }
        entries.insert(namespaced(key), raw);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(&namespaced(key));
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<(String, Record)>> {
        let entries = self.entries.read().await;
        let mut out = Vec::with_capacity(entries.len());
        for (full_key, raw) in entries.iter() {
            let key = full_key[KEY_NAMESPACE.len()..].to_string();
            match serde_json::from_str(raw) {
                Ok(record) => out.push((key, record)),
                Err(err) => warn!("skipping unreadable record `{key}`: {err}"),
            }
        }
        Ok(out)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
