use std::sync::Arc;

use rb_agent::ConversationDispatcher;
use rb_domain::clock::Clock;
use rb_domain::config::Config;
use rb_sessions::{SessionRegistry, SummaryStore, TranscriptWriter};
use rb_telegram::ChatTransport;

/// Everything the poll loop and its summary workers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: Arc<dyn ChatTransport>,
    /// Conversation turns, bounded by the dispatch timeout.
    pub dispatcher: Arc<ConversationDispatcher>,
    /// Session summaries, bounded by the summarize timeout.
    pub summarizer: Arc<ConversationDispatcher>,
    pub sessions: Arc<SessionRegistry>,
    pub summaries: Arc<SummaryStore>,
    /// Per-session transcripts; `None` when disabled.
    pub transcripts: Option<Arc<TranscriptWriter>>,
    pub clock: Arc<dyn Clock>,
}
