//! Telegram Bot API transport for relaybot.
//!
//! Only the slice of the API the relay needs: long-polling `getUpdates`
//! for text messages and `sendMessage` for replies.

pub mod chunk;
pub mod client;
pub mod transport;
pub mod types;

pub use chunk::{send_chunked, split_message};
pub use client::TelegramClient;
pub use transport::ChatTransport;
pub use types::Update;
