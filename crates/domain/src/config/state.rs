use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durable state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Root directory for all durable files.  Relative paths below are
    /// resolved against it.
    #[serde(default = "d_dir")]
    pub dir: PathBuf,

    /// Poll cursor file (`{"offset": N}`).
    #[serde(default = "d_cursor_file")]
    pub cursor_file: PathBuf,

    /// Append-only JSONL log of session summaries.
    #[serde(default = "d_summaries_file")]
    pub summaries_file: PathBuf,

    /// Write a per-session transcript of every exchange.
    #[serde(default = "d_true")]
    pub transcripts: bool,

    #[serde(default = "d_transcripts_dir")]
    pub transcripts_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: d_dir(),
            cursor_file: d_cursor_file(),
            summaries_file: d_summaries_file(),
            transcripts: true,
            transcripts_dir: d_transcripts_dir(),
        }
    }
}

impl StateConfig {
    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(&self.cursor_file)
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.dir.join(&self.summaries_file)
    }

    pub fn transcripts_path(&self) -> PathBuf {
        self.dir.join(&self.transcripts_dir)
    }
}

fn d_dir() -> PathBuf {
    PathBuf::from("/bot")
}
fn d_cursor_file() -> PathBuf {
    PathBuf::from("state.json")
}
fn d_summaries_file() -> PathBuf {
    PathBuf::from("sessions.jsonl")
}
fn d_transcripts_dir() -> PathBuf {
    PathBuf::from("chats")
}
fn d_true() -> bool {
    true
}
