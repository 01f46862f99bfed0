//! Session state for relaybot.
//!
//! Tracks which agent session each chat is using, expires idle sessions,
//! and owns the durable state that survives restarts: the poll cursor,
//! the append-only summary log, and per-session transcripts.

pub mod cursor;
pub mod lifecycle;
pub mod registry;
pub mod summaries;
pub mod transcript;

pub use cursor::PollCursor;
pub use lifecycle::{ExpiryReason, LifecycleManager};
pub use registry::{ExpiredSession, Resolution, SessionRecord, SessionRegistry};
pub use summaries::{SummaryEntry, SummaryStore};
pub use transcript::{TranscriptLine, TranscriptWriter};
