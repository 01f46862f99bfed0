use serde::Serialize;

/// Structured trace events emitted across all relaybot crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    CursorAdvanced {
        offset: i64,
    },
    SessionResolved {
        chat_id: i64,
        session_id: String,
        is_new: bool,
    },
    SessionExpired {
        chat_id: i64,
        session_id: String,
        idle_secs: i64,
    },
    SummaryAppended {
        chat_id: i64,
        session_id: String,
        summary_chars: usize,
    },
    SummaryDropped {
        chat_id: i64,
        session_id: String,
        reason: String,
    },
    AgentInvoked {
        session_id: String,
        is_new: bool,
        tool_calls: usize,
        duration_ms: u64,
        ok: bool,
    },
    ReplySent {
        chat_id: i64,
        chunks: usize,
        fallback: bool,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rb_event");
    }
}
