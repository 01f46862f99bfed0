use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session lifecycle rules.  There is one global idle timeout; chats
/// cannot override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// A session whose last message is at least this old is expired,
    /// summarized, and replaced on the next message.
    #[serde(default = "d_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Minimum spacing between idle sweeps inside a batch of updates.
    /// A sweep also runs at the top of every poll cycle.
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: d_idle_timeout(),
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn d_idle_timeout() -> u64 {
    300
}
fn d_sweep_interval() -> u64 {
    30
}
