//! Durable poll cursor.
//!
//! A single integer watermark (`{"offset": N}`) naming the next update to
//! fetch.  It only moves forward, and the in-memory value changes only
//! after the new value is on disk, so a fetch never uses an unsaved
//! offset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rb_domain::error::{Error, Result};
use rb_domain::trace::TraceEvent;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    #[serde(default)]
    offset: i64,
}

#[derive(Debug)]
pub struct PollCursor {
    path: PathBuf,
    offset: i64,
}

impl PollCursor {
    /// Load the cursor from `path`.
    ///
    /// A missing or unreadable file starts from zero; corruption is
    /// logged, never fatal.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CursorFile>(&raw) {
                Ok(file) => file.offset.max(0),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupt cursor file, starting fresh"
                    );
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable cursor file, starting fresh"
                );
                0
            }
        };

        tracing::info!(offset, path = %path.display(), "poll cursor loaded");
        Self { path, offset }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Offset to send with the next fetch.  `None` until the first update
    /// has been acknowledged.
    pub fn fetch_offset(&self) -> Option<i64> {
        (self.offset > 0).then_some(self.offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the cursor to `new_offset` and persist it.
    ///
    /// Regressions are ignored.  On a write error the in-memory offset is
    /// left unchanged and the error is returned.
    pub fn advance(&mut self, new_offset: i64) -> Result<()> {
        if new_offset <= self.offset {
            tracing::debug!(
                current = self.offset,
                requested = new_offset,
                "ignoring non-advancing cursor update"
            );
            return Ok(());
        }

        write_atomic(&self.path, new_offset)?;
        self.offset = new_offset;

        TraceEvent::CursorAdvanced { offset: new_offset }.emit();
        Ok(())
    }
}

/// Write via a temp file + rename so a crash mid-write leaves either the
/// old or the new offset, never a torn file.
fn write_atomic(path: &Path, offset: i64) -> Result<()> {
    let persist_err = |e: std::io::Error| {
        Error::Persistence(format!("writing cursor {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
    }

    let json = serde_json::to_string(&CursorFile { offset })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(persist_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(persist_err(e));
    }
    Ok(())
}
