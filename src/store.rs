//! Transcript persistence
//!
//! Records are appended per conversation identifier. The only query besides
//! the append is a whole-transcript load for the HTTP surface.

mod file;
mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use crate::state_machine::{Role, Turn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Invalid store location: {0}")]
    InvalidLocation(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One stored turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
}

impl TranscriptRecord {
    pub fn from_turn(turn: &Turn, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Append-only transcript persistence keyed by conversation identifier
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Create the transcript if absent, then append `records` in order
    async fn append(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()>;

    /// All records for a conversation, `None` if nothing was ever stored
    async fn load(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>>;
}

#[async_trait]
impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    async fn append(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()> {
        (**self).append(conversation_id, records).await
    }

    async fn load(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>> {
        (**self).load(conversation_id).await
    }
}

/// Where transcripts go, parsed from `sqlite:<path>` or `file:<path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Sqlite(PathBuf),
    File(PathBuf),
}

impl StoreLocation {
    pub fn open(&self) -> StoreResult<Arc<dyn TranscriptStore>> {
        ensure_parent(self.path())?;
        match self {
            StoreLocation::Sqlite(path) => Ok(Arc::new(SqliteStore::open(path)?)),
            StoreLocation::File(path) => Ok(Arc::new(FileStore::new(path))),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            StoreLocation::Sqlite(path) | StoreLocation::File(path) => path,
        }
    }
}

impl Default for StoreLocation {
    fn default() -> Self {
        StoreLocation::Sqlite(expand_home("~/.interview-bot/transcripts.db"))
    }
}

impl FromStr for StoreLocation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, path) = s
            .split_once(':')
            .ok_or_else(|| StoreError::InvalidLocation(s.to_string()))?;
        if path.trim().is_empty() {
            return Err(StoreError::InvalidLocation(s.to_string()));
        }
        match scheme {
            "sqlite" => Ok(StoreLocation::Sqlite(expand_home(path))),
            "file" => Ok(StoreLocation::File(expand_home(path))),
            _ => Err(StoreError::InvalidLocation(s.to_string())),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
