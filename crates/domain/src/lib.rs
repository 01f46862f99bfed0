//! Shared types for relaybot: errors, configuration, agent events, trace
//! events and the clock abstraction used by session bookkeeping.

pub mod clock;
pub mod config;
pub mod error;
pub mod stream;
pub mod trace;

/// Identifier of one chat thread on the chat platform.
pub type ChatId = i64;
