//! Service facade over the record store: key reservation, resolution with
//! self-healing, deletion, and the admin index. Handlers own the raw bytes;
//! this layer owns the record lifecycle.

use crate::config::AppConfig;
use crate::models::record::{Payload, Record};
use crate::services::keygen::KeyGenerator;
use crate::services::record_store::{RecordStore, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CdnError {
    #[error("no free key found within the retry budget")]
    KeyspaceExhausted,
    #[error("no record for key `{0}`")]
    NotFound(String),
    #[error("record `{0}` lost its backing file and has been removed")]
    Gone(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CdnResult<T> = Result<T, CdnError>;

/// What a key resolves to. File payloads are streamed by the handler, so
/// only the path and mime type travel here; pastes are small and read
/// eagerly so a vanished file is caught in one place.
#[derive(Debug)]
pub enum Resolved {
    File { path: PathBuf, mime_type: String },
    Paste { content: String, language: String },
    ShortLink { target: String },
}

/// One row of the admin index: the public key and what it points at.
#[derive(Debug, Serialize)]
pub struct IndexEntry {
    pub key: String,
    pub target: String,
}

/// Admin listing, grouped by record kind.
#[derive(Debug, Default, Serialize)]
pub struct CdnIndex {
    pub files: Vec<IndexEntry>,
    pub pastes: Vec<IndexEntry>,
    pub short_links: Vec<IndexEntry>,
}

/// Shared application state. Dependencies are injected explicitly; there are
/// no process-wide singletons.
#[derive(Clone)]
pub struct CdnService {
    pub store: Arc<dyn RecordStore>,
    pub keygen: KeyGenerator,
    pub config: Arc<AppConfig>,
}

impl CdnService {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            keygen: KeyGenerator::new(config.key_length),
            config,
        }
    }

    /// Current time as milliseconds since the Unix epoch, the unit every
    /// record timestamp uses.
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Reserve a fresh key and atomically write the record built for it.
    pub async fn reserve_record<F>(&self, make: F) -> CdnResult<(String, Record)>
    where
        F: Fn(&str) -> Record,
    {
        self.keygen.reserve(self.store.as_ref(), make).await
    }

    pub async fn create_short_link(&self, target: &str) -> CdnResult<String> {
        let created_at = Self::now_ms();
        let (key, _) = self
            .reserve_record(|_| Record::short_link(target, created_at))
            .await?;
        Ok(key)
    }

    /// Look up a key. A File/Paste record whose backing file has vanished is
    /// dropped from the store on the spot and reported as `Gone`, so the
    /// next lookup is a clean 404.
    pub async fn resolve(&self, key: &str) -> CdnResult<Resolved> {
        let record = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| CdnError::NotFound(key.to_string()))?;

        match record.payload {
            Payload::ShortLink { target } => Ok(Resolved::ShortLink { target }),
            Payload::File { path, mime_type } => match fs::metadata(&path).await {
                Ok(_) => Ok(Resolved::File { path, mime_type }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Err(self.heal(key).await),
                Err(err) => Err(err.into()),
            },
            Payload::Paste { path, language } => match fs::read_to_string(&path).await {
                Ok(content) => Ok(Resolved::Paste { content, language }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Err(self.heal(key).await),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Drop a record whose backing file is missing.
    async fn heal(&self, key: &str) -> CdnError {
        if let Err(err) = self.store.delete(key).await {
            warn!("failed to drop stale record `{key}`: {err}");
        }
        CdnError::Gone(key.to_string())
    }

    /// Explicit deletion (admin surface): remove the store entry first, then
    /// the backing file if one exists. An already-missing file is fine.
    pub async fn delete(&self, key: &str) -> CdnResult<()> {
        let record = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| CdnError::NotFound(key.to_string()))?;
        self.store.delete(key).await?;

        if let Some(path) = record.file_path() {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Grouped index of everything stored, for the admin surface.
    pub async fn list(&self) -> CdnResult<CdnIndex> {
        let mut index = CdnIndex::default();
        for (key, record) in self.store.list_all().await? {
            match record.payload {
                Payload::File { path, .. } => index.files.push(IndexEntry {
                    key,
                    target: path.display().to_string(),
                }),
                Payload::Paste { path, .. } => index.pastes.push(IndexEntry {
                    key,
                    target: path.display().to_string(),
                }),
                Payload::ShortLink { target } => {
                    index.short_links.push(IndexEntry { key, target })
                }
            }
        }
        Ok(index)
    }
}
