//! Append-only session summary log.
//!
//! One JSON object per line in `sessions.jsonl`.  Entries are written by
//! summary workers that may run concurrently, so every append goes
//! through a single writer lock.  Entries are never rewritten or removed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rb_domain::error::{Error, Result};
use rb_domain::trace::TraceEvent;
use rb_domain::ChatId;

/// One summarized session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub session_id: String,
    pub chat_id: ChatId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub summary: String,
    /// Transcript of the session, when one was kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_ref: Option<PathBuf>,
}

pub struct SummaryStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry (sync).
    pub fn append(&self, entry: &SummaryEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        {
            let _guard = self.writer.lock();
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| self.persist_err(e))?;
                }
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| self.persist_err(e))?;
            file.write_all(line.as_bytes())
                .map_err(|e| self.persist_err(e))?;
        }

        TraceEvent::SummaryAppended {
            chat_id: entry.chat_id,
            session_id: entry.session_id.clone(),
            summary_chars: entry.summary.chars().count(),
        }
        .emit();

        Ok(())
    }

    /// Append one entry without blocking the tokio runtime.
    pub async fn append_async(self: &Arc<Self>, entry: SummaryEntry) -> Result<()> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.append(&entry))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }

    /// Read every entry back.  Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<SummaryEntry>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut entries = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<SummaryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "skipping malformed summary line"
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Summaries recorded for one chat, oldest first.
    pub fn for_chat(&self, chat_id: ChatId) -> Result<Vec<SummaryEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.chat_id == chat_id)
            .collect())
    }

    fn persist_err(&self, e: std::io::Error) -> Error {
        Error::Persistence(format!("appending to {}: {e}", self.path.display()))
    }
}
