//! In-memory session registry.
//!
//! Maps each chat to the agent session it is currently using.  All
//! mutation goes through `resolve`, `sweep_expired`, `expire` and
//! `touch`, which share one lock, so a session can never be re-created
//! for a chat while its predecessor is being detached for summarization.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rb_domain::trace::TraceEvent;
use rb_domain::ChatId;

use crate::lifecycle::{ExpiryReason, LifecycleManager};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single active session.  Cloning yields a detached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Continuation key passed to the agent (`--session-id` / `--resume`).
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Transcript file for this session, when transcripts are enabled.
    #[serde(default)]
    pub log_ref: Option<PathBuf>,
}

/// Outcome of [`SessionRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub session_id: String,
    pub is_new: bool,
    pub log_ref: Option<PathBuf>,
    /// The stale predecessor, already removed from the registry.  The
    /// caller owns it and is responsible for summarizing it.
    pub expired: Option<ExpiredSession>,
}

/// A session removed from the registry, handed off for summarization.
#[derive(Debug, Clone)]
pub struct ExpiredSession {
    pub chat_id: ChatId,
    pub record: SessionRecord,
    pub reason: ExpiryReason,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionRegistry {
    lifecycle: LifecycleManager,
    /// When set, new sessions get `<dir>/<session_id>.jsonl` as `log_ref`.
    transcript_dir: Option<PathBuf>,
    sessions: Mutex<HashMap<ChatId, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            lifecycle: LifecycleManager::new(idle_timeout),
            transcript_dir: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    /// Return the live session for `chat_id`, or mint a new one.
    ///
    /// A live session has its activity refreshed.  A stale one is removed
    /// first and returned in [`Resolution::expired`].
    pub fn resolve(&self, chat_id: ChatId, now: DateTime<Utc>) -> Resolution {
        let mut sessions = self.sessions.lock();

        let verdict = sessions
            .get(&chat_id)
            .map(|rec| self.lifecycle.should_expire(rec, now));

        let expired = match verdict {
            Some(None) => {
                if let Some(rec) = sessions.get_mut(&chat_id) {
                    rec.last_active_at = now;
                    TraceEvent::SessionResolved {
                        chat_id,
                        session_id: rec.session_id.clone(),
                        is_new: false,
                    }
                    .emit();
                    return Resolution {
                        session_id: rec.session_id.clone(),
                        is_new: false,
                        log_ref: rec.log_ref.clone(),
                        expired: None,
                    };
                }
                None
            }
            Some(Some(reason)) => sessions.remove(&chat_id).map(|record| {
                log_expired(chat_id, &record, &reason);
                ExpiredSession {
                    chat_id,
                    record,
                    reason,
                }
            }),
            None => None,
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        let log_ref = self
            .transcript_dir
            .as_ref()
            .map(|dir| dir.join(format!("{session_id}.jsonl")));
        sessions.insert(
            chat_id,
            SessionRecord {
                session_id: session_id.clone(),
                started_at: now,
                last_active_at: now,
                log_ref: log_ref.clone(),
            },
        );

        TraceEvent::SessionResolved {
            chat_id,
            session_id: session_id.clone(),
            is_new: true,
        }
        .emit();

        Resolution {
            session_id,
            is_new: true,
            log_ref,
            expired,
        }
    }

    /// Remove and return every session idle for at least the timeout.
    ///
    /// Results are ordered by chat id.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ExpiredSession> {
        let mut sessions = self.sessions.lock();

        let mut stale: Vec<(ChatId, ExpiryReason)> = sessions
            .iter()
            .filter_map(|(chat_id, rec)| {
                self.lifecycle
                    .should_expire(rec, now)
                    .map(|reason| (*chat_id, reason))
            })
            .collect();
        stale.sort_by_key(|(chat_id, _)| *chat_id);

        stale
            .into_iter()
            .filter_map(|(chat_id, reason)| {
                let record = sessions.remove(&chat_id)?;
                log_expired(chat_id, &record, &reason);
                Some(ExpiredSession {
                    chat_id,
                    record,
                    reason,
                })
            })
            .collect()
    }

    /// Remove the session for `chat_id` regardless of its age.
    pub fn expire(&self, chat_id: ChatId) -> Option<SessionRecord> {
        let record = self.sessions.lock().remove(&chat_id)?;
        log_expired(chat_id, &record, &ExpiryReason::Explicit);
        Some(record)
    }

    /// Mark the session as active at `now` (e.g. after a reply was sent).
    /// Does nothing when the chat has no session.
    pub fn touch(&self, chat_id: ChatId, now: DateTime<Utc>) {
        if let Some(rec) = self.sessions.lock().get_mut(&chat_id) {
            if now > rec.last_active_at {
                rec.last_active_at = now;
            }
        }
    }

    /// Snapshot of the session for `chat_id`.
    pub fn get(&self, chat_id: ChatId) -> Option<SessionRecord> {
        self.sessions.lock().get(&chat_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn idle_timeout(&self) -> chrono::Duration {
        self.lifecycle.idle_timeout()
    }
}

fn log_expired(chat_id: ChatId, record: &SessionRecord, reason: &ExpiryReason) {
    let idle_secs = match reason {
        ExpiryReason::IdleTimeout { idle_secs } => *idle_secs,
        ExpiryReason::Explicit => 0,
    };
    tracing::info!(
        chat_id,
        session_id = %record.session_id,
        reason = %reason,
        "session expired"
    );
    TraceEvent::SessionExpired {
        chat_id,
        session_id: record.session_id.clone(),
        idle_secs,
    }
    .emit();
}
