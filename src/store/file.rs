//! JSON-lines log file: one record per line, tagged with its conversation

use super::{StoreResult, TranscriptRecord, TranscriptStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Serialize, Deserialize)]
struct LogLine {
    conversation_id: String,
    #[serde(flatten)]
    record: TranscriptRecord,
}

pub struct FileStore {
    path: PathBuf,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TranscriptStore for FileStore {
    async fn append(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()> {
        let mut buf = String::new();
        for record in records {
            let line = LogLine {
                conversation_id: conversation_id.to_string(),
                record: record.clone(),
            };
            buf.push_str(&serde_json::to_string(&line)?);
            buf.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let entry: LogLine = serde_json::from_str(line)?;
            if entry.conversation_id == conversation_id {
                records.push(entry.record);
            }
        }

        Ok(if records.is_empty() { None } else { Some(records) })
    }
}
