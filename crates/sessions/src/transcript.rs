//! Append-only JSONL transcripts.
//!
//! Each session gets a `<sessionId>.jsonl` file under the transcripts
//! directory.  Every inbound prompt and outbound reply is appended as a
//! single JSON line.  Transcripts are a record for humans; nothing in the
//! relay reads them back on the hot path.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rb_domain::error::{Error, Result};
use rb_domain::trace::TraceEvent;

/// A single transcript line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub timestamp: String,
    pub role: String,
    pub content: String,
}

pub struct TranscriptWriter {
    base_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }

    /// Helper to create a transcript line stamped `at`.
    pub fn line(role: &str, content: &str, at: DateTime<Utc>) -> TranscriptLine {
        TranscriptLine {
            timestamp: at.to_rfc3339(),
            role: role.to_owned(),
            content: content.to_owned(),
        }
    }

    /// Append lines to a session's transcript (sync).
    pub fn append(&self, session_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let buf = serialize_lines(lines)?;
        append_to(&self.path_for(session_id), &buf)?;

        TraceEvent::TranscriptAppend {
            session_id: session_id.to_owned(),
            lines: lines.len(),
        }
        .emit();
        Ok(())
    }

    /// Append lines to a session's transcript (async).
    ///
    /// Uses `spawn_blocking` to avoid blocking the tokio runtime during file I/O.
    pub async fn append_async(&self, session_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let buf = serialize_lines(lines)?;
        let path = self.path_for(session_id);

        tokio::task::spawn_blocking(move || append_to(&path, &buf))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        TraceEvent::TranscriptAppend {
            session_id: session_id.to_owned(),
            lines: lines.len(),
        }
        .emit();
        Ok(())
    }

    /// Read back a transcript.  Missing files read as empty.
    pub fn read(&self, session_id: &str) -> Result<Vec<TranscriptLine>> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut lines = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<TranscriptLine>(line) {
                Ok(tl) => lines.push(tl),
                Err(e) => {
                    tracing::warn!(
                        session_id,
                        error = %e,
                        "skipping malformed transcript line"
                    );
                }
            }
        }
        Ok(lines)
    }
}

fn serialize_lines(lines: &[TranscriptLine]) -> Result<String> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(&serde_json::to_string(line)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn append_to(path: &Path, buf: &str) -> Result<()> {
    let persist_err =
        |e: std::io::Error| Error::Persistence(format!("appending to {}: {e}", path.display()));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(persist_err)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(persist_err)?;
    file.write_all(buf.as_bytes()).map_err(persist_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(&dir.path().join("chats"));

        writer
            .append("s1", &[TranscriptWriter::line("user", "hello", Utc::now())])
            .unwrap();
        writer
            .append("s1", &[TranscriptWriter::line("assistant", "hi there", Utc::now())])
            .unwrap();

        let lines = writer.read("s1").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].role, "user");
        assert_eq!(lines[1].content, "hi there");
        assert!(writer.read("other").unwrap().is_empty());
    }

    #[test]
    fn line_uses_the_given_time() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let line = TranscriptWriter::line("user", "hi", at);
        assert_eq!(line.timestamp, "2026-03-01T09:00:00+00:00");
    }

    #[tokio::test]
    async fn async_append_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(&dir.path().join("deep").join("chats"));
        writer
            .append_async("s2", &[TranscriptWriter::line("user", "ping", Utc::now())])
            .await
            .unwrap();
        assert!(writer.path_for("s2").exists());
        assert_eq!(writer.read("s2").unwrap().len(), 1);
    }
}
