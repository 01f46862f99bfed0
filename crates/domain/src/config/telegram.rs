use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telegram transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token.  The token itself is
    /// never stored in the config file.
    #[serde(default = "d_token_env")]
    pub token_env: String,

    /// Bot API base URL (without the `/bot<token>` suffix).
    #[serde(default = "d_api_base")]
    pub api_base: String,

    /// Long-poll wait passed to `getUpdates`, in seconds.
    #[serde(default = "d_30")]
    pub poll_timeout_secs: u64,

    /// Client-side HTTP timeout for every Bot API call.  Must exceed
    /// `poll_timeout_secs` or long polls will be cut short.
    #[serde(default = "d_60")]
    pub request_timeout_secs: u64,

    /// Maximum characters per outbound message.
    #[serde(default = "d_4096")]
    pub max_message_chars: usize,

    /// Fixed delay after a failed fetch or persist before the next cycle.
    #[serde(default = "d_10")]
    pub backoff_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: d_token_env(),
            api_base: d_api_base(),
            poll_timeout_secs: d_30(),
            request_timeout_secs: d_60(),
            max_message_chars: d_4096(),
            backoff_secs: d_10(),
        }
    }
}

impl TelegramConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

fn d_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}
fn d_api_base() -> String {
    "https://api.telegram.org".into()
}
fn d_30() -> u64 {
    30
}
fn d_60() -> u64 {
    60
}
fn d_10() -> u64 {
    10
}
fn d_4096() -> usize {
    4096
}
