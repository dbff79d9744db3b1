//! SQLite document store: one row per conversation, records as a JSON array

use super::{StoreError, StoreResult, TranscriptRecord, TranscriptStore};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS transcripts (
    conversation_id TEXT PRIMARY KEY,
    records TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Thread-safe transcript database handle
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn append_sync(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<String> = tx
            .query_row(
                "SELECT records FROM transcripts WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        let mut stored: Vec<TranscriptRecord> = match existing {
            Some(json) => serde_json::from_str(&json)?,
            None => {
                tx.execute(
                    "INSERT INTO transcripts (conversation_id, records, created_at, updated_at)
                     VALUES (?1, '[]', ?2, ?2)",
                    params![conversation_id, now],
                )?;
                Vec::new()
            }
        };

        stored.extend_from_slice(records);

        tx.execute(
            "UPDATE transcripts SET records = ?1, updated_at = ?2 WHERE conversation_id = ?3",
            params![serde_json::to_string(&stored)?, now, conversation_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_sync(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT records FROM transcripts WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }
}

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn append(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()> {
        self.append_sync(conversation_id, records)
    }

    async fn load(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>> {
        self.load_sync(conversation_id)
    }
}
