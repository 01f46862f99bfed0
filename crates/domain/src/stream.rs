use serde::Serialize;
use std::pin::Pin;

/// A boxed async stream, used for agent event streams.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while the external agent works on a prompt.
///
/// Only [`AgentEvent::Result`] (or the end-of-stream
/// [`AgentEvent::Diagnostic`] fallback) carries the final answer; tool
/// events exist for observability and side-channel pings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// The agent invoked a tool.
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: serde_json::Value,
    },

    /// A tool invocation finished.
    #[serde(rename = "tool_result")]
    ToolResult { is_error: bool },

    /// Terminal result text.
    #[serde(rename = "result")]
    Result { text: String },

    /// Captured diagnostic output (stderr), emitted once after the event
    /// stream closed without a result.
    #[serde(rename = "diagnostic")]
    Diagnostic { text: String },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}
