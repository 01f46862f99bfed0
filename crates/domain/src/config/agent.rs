use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External agent (claude CLI)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Executable to spawn.
    #[serde(default = "d_program")]
    pub program: String,

    /// Model passed via `--model`.  `None` lets the CLI choose.
    #[serde(default = "d_model")]
    pub model: Option<String>,

    /// Working directory of the agent process.
    #[serde(default = "d_workdir")]
    pub workdir: PathBuf,

    /// Arguments appended after the built-in ones.
    #[serde(default = "d_extra_args")]
    pub extra_args: Vec<String>,

    /// Hard wall-clock limit for a conversational turn.
    #[serde(default = "d_600")]
    pub dispatch_timeout_secs: u64,

    /// Hard wall-clock limit for a summarization request.
    #[serde(default = "d_120")]
    pub summarize_timeout_secs: u64,

    /// Prompt sent when an idle session is summarized.
    #[serde(default = "d_summary_prompt")]
    pub summary_prompt: String,

    /// Reply sent to the chat when the agent fails or times out.
    #[serde(default = "d_fallback_reply")]
    pub fallback_reply: String,

    /// Sent once per turn on the first tool invocation.  Empty disables it.
    #[serde(default = "d_working_notice")]
    pub working_notice: String,

    /// The agent may separate several messages with this marker.
    #[serde(default = "d_split_marker")]
    pub reply_split_marker: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: d_program(),
            model: d_model(),
            workdir: d_workdir(),
            extra_args: d_extra_args(),
            dispatch_timeout_secs: d_600(),
            summarize_timeout_secs: d_120(),
            summary_prompt: d_summary_prompt(),
            fallback_reply: d_fallback_reply(),
            working_notice: d_working_notice(),
            reply_split_marker: d_split_marker(),
        }
    }
}

impl AgentConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }
}

fn d_program() -> String {
    "claude".into()
}
fn d_model() -> Option<String> {
    Some("claude-sonnet-4-6".into())
}
fn d_workdir() -> PathBuf {
    PathBuf::from("/bot")
}
fn d_extra_args() -> Vec<String> {
    vec!["--dangerously-skip-permissions".into()]
}
fn d_600() -> u64 {
    600
}
fn d_120() -> u64 {
    120
}
fn d_summary_prompt() -> String {
    "Summarize our conversation so far in 2-3 concise bullet points. \
     Focus on key decisions, facts learned, and any pending tasks. \
     Output ONLY the bullet points, nothing else."
        .into()
}
fn d_fallback_reply() -> String {
    "Something went wrong, try again.".into()
}
fn d_working_notice() -> String {
    "🔧 Working on it...".into()
}
fn d_split_marker() -> String {
    "---SPLIT---".into()
}
