use std::time::Duration;

use rb_domain::error::Result;
use rb_domain::ChatId;

use crate::types::Update;

/// The chat platform as seen by the poll loop.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Long-poll for updates with id `>= offset`, waiting at most `wait`
    /// for the first one.  Updates come back in ascending id order.
    async fn get_updates(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>>;

    /// Send one message.  `text` must already fit the platform limit.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
