use rb_domain::error::Result;
use rb_domain::stream::{AgentEvent, BoxStream};

/// Whether the agent should start a new session or continue one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Create,
    Resume,
}

impl SessionMode {
    pub fn from_is_new(is_new: bool) -> Self {
        if is_new {
            Self::Create
        } else {
            Self::Resume
        }
    }
}

/// One prompt addressed to one agent session.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub prompt: String,
    /// Continuation key for the agent session.
    pub session_id: String,
    pub mode: SessionMode,
}

/// Trait that every agent adapter must implement.
///
/// `start` launches the work and returns a lazy stream of events.  Dropping
/// the stream must abort the underlying work.
#[async_trait::async_trait]
pub trait AgentBackend: Send + Sync {
    async fn start(&self, req: InvokeRequest) -> Result<BoxStream<'static, Result<AgentEvent>>>;

    /// A short identifier for logs.
    fn name(&self) -> &str;
}
