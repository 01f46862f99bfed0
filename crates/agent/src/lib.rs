//! External agent invocation for relaybot.
//!
//! - [`backend`]: the [`AgentBackend`] seam producing a stream of
//!   [`AgentEvent`](rb_domain::stream::AgentEvent)s for one prompt.
//! - [`claude`]: the `claude` CLI backend (`--output-format stream-json`).
//! - [`dispatcher`]: timeout enforcement and final-result extraction.

pub mod backend;
pub mod claude;
pub mod dispatcher;
pub mod parse;

pub use backend::{AgentBackend, InvokeRequest, SessionMode};
pub use claude::ClaudeCli;
pub use dispatcher::{ConversationDispatcher, DispatchError};
