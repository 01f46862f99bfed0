//! Background summarization of expired sessions.
//!
//! A worker resumes the expired session once with the summary prompt and
//! appends the answer to the summary log.  Any failure is logged and the
//! summary is dropped; there are no retries.

use std::future::Future;

use chrono::{DateTime, Utc};

use rb_domain::trace::TraceEvent;
use rb_sessions::{ExpiredSession, SummaryEntry};

use crate::state::AppState;

/// The worker for `expired`, to be spawned by the caller.  `ended_at` is
/// when the session was found expired.
pub fn summary_task(
    state: &AppState,
    expired: ExpiredSession,
    ended_at: DateTime<Utc>,
) -> impl Future<Output = ()> + Send + 'static {
    let summarizer = state.summarizer.clone();
    let store = state.summaries.clone();
    let prompt = state.config.agent.summary_prompt.clone();

    async move {
        let ExpiredSession {
            chat_id,
            record,
            reason,
        } = expired;
        tracing::info!(
            chat_id,
            session_id = %record.session_id,
            reason = %reason,
            "summarizing expired session"
        );

        let drop_summary = |why: String| {
            tracing::warn!(
                chat_id,
                session_id = %record.session_id,
                reason = %why,
                "session summary dropped"
            );
            TraceEvent::SummaryDropped {
                chat_id,
                session_id: record.session_id.clone(),
                reason: why,
            }
            .emit();
        };

        let summary = match summarizer
            .invoke(&prompt, &record.session_id, false, None)
            .await
        {
            Ok(text) => text,
            Err(e) => return drop_summary(e.to_string()),
        };

        let entry = SummaryEntry {
            session_id: record.session_id.clone(),
            chat_id,
            started_at: record.started_at,
            ended_at,
            summary,
            log_ref: record.log_ref.clone(),
        };
        if let Err(e) = store.append_async(entry).await {
            drop_summary(e.to_string());
        }
    }
}
