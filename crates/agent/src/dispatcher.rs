//! Conversation dispatcher: one prompt in, one final text out.
//!
//! Wraps an [`AgentBackend`] with a hard wall-clock deadline.  Tool events
//! are logged and forwarded to an optional side channel; only a `Result`
//! event (or the end-of-stream diagnostic) produces the return value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::mpsc;

use rb_domain::stream::AgentEvent;
use rb_domain::trace::TraceEvent;

use crate::backend::{AgentBackend, InvokeRequest, SessionMode};

const INPUT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The agent did not produce a result before the deadline.  The
    /// underlying work has been cancelled.
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("agent failed: {0}")]
    Backend(#[from] rb_domain::error::Error),

    /// The stream ended without a result or any diagnostic output.
    #[error("agent returned no result")]
    NoResult,
}

pub struct ConversationDispatcher {
    backend: Arc<dyn AgentBackend>,
    timeout: Duration,
    /// Return captured diagnostics when the agent produced no result.
    diagnostic_fallback: bool,
}

impl ConversationDispatcher {
    pub fn new(backend: Arc<dyn AgentBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            diagnostic_fallback: true,
        }
    }

    /// Same backend, different deadline (used for summarization).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            backend: self.backend.clone(),
            timeout,
            diagnostic_fallback: self.diagnostic_fallback,
        }
    }

    /// Only a real `Result` event counts; diagnostics become
    /// [`DispatchError::NoResult`].
    pub fn without_diagnostic_fallback(mut self) -> Self {
        self.diagnostic_fallback = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `prompt` to the session `session_id`, creating it when
    /// `is_new`, and return the agent's final text.
    ///
    /// Tool events are sent to `on_event` as they arrive.  The sender is
    /// dropped when this call returns.
    pub async fn invoke(
        &self,
        prompt: &str,
        session_id: &str,
        is_new: bool,
        on_event: Option<mpsc::UnboundedSender<AgentEvent>>,
    ) -> Result<String, DispatchError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let req = InvokeRequest {
            prompt: prompt.to_owned(),
            session_id: session_id.to_owned(),
            mode: SessionMode::from_is_new(is_new),
        };

        let mut tool_calls = 0usize;
        let outcome = self
            .run(req, deadline, on_event.as_ref(), &mut tool_calls)
            .await;

        TraceEvent::AgentInvoked {
            session_id: session_id.to_owned(),
            is_new,
            tool_calls,
            duration_ms: started.elapsed().as_millis() as u64,
            ok: outcome.is_ok(),
        }
        .emit();

        if let Err(e) = &outcome {
            tracing::warn!(
                backend = self.backend.name(),
                session_id,
                error = %e,
                "agent dispatch failed"
            );
        }
        outcome
    }

    async fn run(
        &self,
        req: InvokeRequest,
        deadline: tokio::time::Instant,
        on_event: Option<&mpsc::UnboundedSender<AgentEvent>>,
        tool_calls: &mut usize,
    ) -> Result<String, DispatchError> {
        let mut stream = tokio::time::timeout_at(deadline, self.backend.start(req))
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))??;

        let mut result: Option<String> = None;
        let mut diagnostic: Option<String> = None;

        // Keep draining after a result so the agent can exit cleanly; the
        // deadline still bounds the whole call.
        loop {
            let next = match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(next) => next,
                Err(_) if result.is_some() => {
                    tracing::debug!("deadline reached after result, abandoning agent");
                    break;
                }
                Err(_) => return Err(DispatchError::Timeout(self.timeout)),
            };

            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    if result.is_some() {
                        break;
                    }
                    return Err(e.into());
                }
            };

            match &event {
                AgentEvent::ToolUse { name, input } => {
                    *tool_calls += 1;
                    tracing::info!(
                        tool = %name,
                        input = %preview(&input.to_string()),
                        "agent tool call"
                    );
                }
                AgentEvent::ToolResult { is_error } => {
                    tracing::debug!(is_error, "agent tool done");
                }
                AgentEvent::Result { text } => {
                    if !text.trim().is_empty() {
                        result = Some(text.trim().to_owned());
                    }
                    continue;
                }
                AgentEvent::Diagnostic { text } => {
                    diagnostic = Some(text.clone());
                    continue;
                }
            }

            if let Some(tx) = on_event {
                // A closed receiver only means nobody is watching.
                let _ = tx.send(event);
            }
        }

        if let (None, Some(text)) = (&result, &diagnostic) {
            tracing::debug!(diagnostic = %preview(text), "agent ended without a result");
        }
        let diagnostic = diagnostic.filter(|_| self.diagnostic_fallback);
        result.or(diagnostic).ok_or(DispatchError::NoResult)
    }
}

fn preview(s: &str) -> String {
    match s.char_indices().nth(INPUT_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_owned(),
    }
}
