//! The control loop: sweep → fetch → dispatch → send, forever.
//!
//! One task owns the cursor and processes updates strictly in ascending id
//! order.  The cursor is committed past an update *before* it is answered,
//! so a crash mid-reply loses that one message instead of replaying it.
//! Expired sessions are handed to detached summary workers which the loop
//! never waits on while running.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use rb_domain::error::Result;
use rb_domain::stream::AgentEvent;
use rb_domain::trace::TraceEvent;
use rb_domain::ChatId;
use rb_sessions::{ExpiredSession, PollCursor, Resolution, TranscriptWriter};
use rb_telegram::{send_chunked, Update};

use crate::runtime::reply::reply_parts;
use crate::runtime::summary_worker::summary_task;
use crate::state::AppState;

pub struct PollLoop {
    state: AppState,
    cursor: PollCursor,
    last_sweep: Option<DateTime<Utc>>,
    workers: JoinSet<()>,
}

impl PollLoop {
    /// Build a loop around `state`, loading the cursor from disk.
    pub fn new(state: AppState) -> Self {
        let cursor = PollCursor::load(state.config.state.cursor_path());
        Self::with_cursor(state, cursor)
    }

    pub fn with_cursor(state: AppState, cursor: PollCursor) -> Self {
        Self {
            state,
            cursor,
            last_sweep: None,
            workers: JoinSet::new(),
        }
    }

    pub fn cursor(&self) -> &PollCursor {
        &self.cursor
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run until `cancel` fires.  Fetch and commit failures back off and
    /// retry; nothing here is fatal.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let backoff = self.state.config.telegram.backoff();
        tracing::info!(
            offset = self.cursor.offset(),
            idle_timeout_secs = self.state.config.sessions.idle_timeout_secs,
            "poll loop started"
        );

        while !cancel.is_cancelled() {
            if let Err(e) = self.poll_once(&cancel).await {
                tracing::warn!(
                    error = %e,
                    backoff_secs = backoff.as_secs(),
                    "poll cycle failed, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            self.reap_workers();
        }

        tracing::info!(offset = self.cursor.offset(), "poll loop stopped");
    }

    /// One cycle: sweep, fetch a batch, handle every update in it.
    ///
    /// Returns the number of updates consumed.  An error means the fetch
    /// or a cursor commit failed; updates after the failed one are left
    /// for the next fetch.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<usize> {
        self.sweep(self.state.clock.now());

        let wait = self.state.config.telegram.poll_timeout();
        let updates = tokio::select! {
            _ = cancel.cancelled() => return Ok(0),
            fetched = self.state.transport.get_updates(self.cursor.fetch_offset(), wait) => fetched?,
        };

        let mut handled = 0;
        for update in &updates {
            if cancel.is_cancelled() {
                break;
            }
            // The transport sorts, but never go backwards.
            if update.update_id < self.cursor.offset() {
                tracing::debug!(update_id = update.update_id, "skipping already-seen update");
                continue;
            }
            self.maybe_sweep();
            self.handle_update(update).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait for every outstanding summary worker.  Used on shutdown and by
    /// tests; the running loop never calls this.
    pub async fn drain_workers(&mut self) {
        while let Some(res) = self.workers.join_next().await {
            if let Err(e) = res {
                tracing::warn!(error = %e, "summary worker panicked");
            }
        }
    }

    // ── Sweep ────────────────────────────────────────────────────────

    fn maybe_sweep(&mut self) {
        let now = self.state.clock.now();
        let interval = chrono::Duration::from_std(self.state.config.sessions.sweep_interval())
            .unwrap_or(chrono::Duration::MAX);
        let due = self.last_sweep.map_or(true, |last| now - last >= interval);
        if due {
            self.sweep(now);
        }
    }

    fn sweep(&mut self, now: DateTime<Utc>) {
        self.last_sweep = Some(now);
        let expired = self.state.sessions.sweep_expired(now);
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "swept idle sessions");
        }
        for session in expired {
            self.summarize(session, now);
        }
    }

    fn summarize(&mut self, expired: ExpiredSession, ended_at: DateTime<Utc>) {
        self.workers
            .spawn(summary_task(&self.state, expired, ended_at));
    }

    fn reap_workers(&mut self) {
        while self.workers.try_join_next().is_some() {}
    }

    // ── Per-update ───────────────────────────────────────────────────

    async fn handle_update(&mut self, update: &Update) -> Result<()> {
        self.cursor.advance(update.update_id + 1)?;

        let Some((chat_id, text)) = update.message() else {
            tracing::debug!(update_id = update.update_id, "skipping non-text update");
            return Ok(());
        };

        let now = self.state.clock.now();
        let session = self.state.sessions.resolve(chat_id, now);
        tracing::info!(
            update_id = update.update_id,
            chat_id,
            session_id = %session.session_id,
            is_new = session.is_new,
            "dispatching message"
        );

        let Resolution {
            session_id,
            is_new,
            expired,
            ..
        } = session;
        if let Some(expired) = expired {
            self.summarize(expired, now);
        }

        self.transcribe(&session_id, "user", text).await;

        let (reply, fallback) = match self.dispatch(chat_id, text, &session_id, is_new).await {
            Some(reply) => (reply, false),
            None => (self.state.config.agent.fallback_reply.clone(), true),
        };

        self.transcribe(&session_id, "assistant", &reply).await;
        let chunks = self.send_reply(chat_id, &reply).await;
        self.state.sessions.touch(chat_id, self.state.clock.now());

        TraceEvent::ReplySent {
            chat_id,
            chunks,
            fallback,
        }
        .emit();
        Ok(())
    }

    /// Invoke the agent, sending the working notice to the chat on the
    /// first tool call.  Failures are already logged by the dispatcher.
    async fn dispatch(
        &self,
        chat_id: ChatId,
        text: &str,
        session_id: &str,
        is_new: bool,
    ) -> Option<String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<AgentEvent>();
        let transport = self.state.transport.clone();
        let notice = self.state.config.agent.working_notice.clone();

        let notifier = async move {
            let mut notified = notice.is_empty();
            while let Some(event) = rx.recv().await {
                if notified || !matches!(event, AgentEvent::ToolUse { .. }) {
                    continue;
                }
                notified = true;
                if let Err(e) = transport.send_message(chat_id, &notice).await {
                    tracing::warn!(chat_id, error = %e, "failed to send working notice");
                }
            }
        };

        let (outcome, ()) = tokio::join!(
            self.state.dispatcher.invoke(text, session_id, is_new, Some(tx)),
            notifier
        );
        outcome.ok()
    }

    /// Send every part of the reply, chunked, in order.  Returns the number
    /// of messages delivered.
    async fn send_reply(&self, chat_id: ChatId, reply: &str) -> usize {
        let limit = self.state.config.telegram.max_message_chars;
        let marker = &self.state.config.agent.reply_split_marker;

        let mut sent = 0;
        for part in reply_parts(reply, marker) {
            match send_chunked(self.state.transport.as_ref(), chat_id, &part, limit).await {
                Ok(n) => sent += n,
                Err(e) => {
                    tracing::warn!(chat_id, error = %e, "failed to send reply");
                    break;
                }
            }
        }
        sent
    }

    async fn transcribe(&self, session_id: &str, role: &str, content: &str) {
        let Some(writer) = &self.state.transcripts else {
            return;
        };
        let line = TranscriptWriter::line(role, content, self.state.clock.now());
        if let Err(e) = writer.append_async(session_id, &[line]).await {
            tracing::warn!(session_id, error = %e, "transcript append failed");
        }
    }
}
