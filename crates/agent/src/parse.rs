//! Parser for the agent CLI's `stream-json` output.
//!
//! Each stdout line is one JSON object.  Two shapes carry tool activity:
//! flat events (`{"type":"tool_use","name":…}`) and message envelopes
//! (`{"type":"assistant","message":{"content":[{"type":"tool_use",…}]}}`).
//! The final answer arrives as `{"type":"result","result":"…"}`.

use serde_json::Value;

use rb_domain::stream::AgentEvent;

/// Parse one output line into zero or more events.
///
/// Blank lines, non-JSON lines and event types we do not track yield
/// nothing.
pub fn parse_line(line: &str) -> Vec<AgentEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let event: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            tracing::trace!(line, "ignoring non-JSON agent output");
            return Vec::new();
        }
    };

    match event.get("type").and_then(Value::as_str).unwrap_or("") {
        "tool_use" => vec![tool_use(&event)],
        "tool_result" => vec![tool_result(&event)],
        "result" => match event.get("result").and_then(Value::as_str) {
            Some(text) => vec![AgentEvent::Result {
                text: text.to_owned(),
            }],
            None => Vec::new(),
        },
        "assistant" | "user" => content_blocks(&event)
            .filter_map(|block| match block.get("type").and_then(Value::as_str) {
                Some("tool_use") => Some(tool_use(block)),
                Some("tool_result") => Some(tool_result(block)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn content_blocks(event: &Value) -> impl Iterator<Item = &Value> {
    event
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn tool_use(v: &Value) -> AgentEvent {
    let name = v
        .get("tool")
        .or_else(|| v.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_owned();
    AgentEvent::ToolUse {
        name,
        input: v.get("input").cloned().unwrap_or(Value::Null),
    }
}

fn tool_result(v: &Value) -> AgentEvent {
    AgentEvent::ToolResult {
        is_error: v.get("is_error").and_then(Value::as_bool).unwrap_or(false),
    }
}
