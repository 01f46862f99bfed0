mod agent;
mod observability;
mod sessions;
mod state;
mod telegram;

pub use agent::*;
pub use observability::*;
pub use sessions::*;
pub use state::*;
pub use telegram::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Startup configuration.  Loaded once; never mutated while running.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.telegram.token_env.is_empty() {
            error("telegram.token_env", "must name an environment variable");
        }
        if self.telegram.max_message_chars == 0 {
            error("telegram.max_message_chars", "must be greater than 0");
        }
        if self.agent.program.is_empty() {
            error("agent.program", "must not be empty");
        }
        if self.agent.dispatch_timeout_secs == 0 {
            error("agent.dispatch_timeout_secs", "must be greater than 0");
        }
        if self.agent.summarize_timeout_secs == 0 {
            error("agent.summarize_timeout_secs", "must be greater than 0");
        }
        if self.sessions.idle_timeout_secs == 0 {
            error("sessions.idle_timeout_secs", "must be greater than 0");
        }

        // A long poll that outlives the HTTP client timeout fails every cycle.
        if self.telegram.request_timeout_secs <= self.telegram.poll_timeout_secs {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "telegram.request_timeout_secs".into(),
                message: format!(
                    "should exceed telegram.poll_timeout_secs ({})",
                    self.telegram.poll_timeout_secs
                ),
            });
        }

        if self.agent.fallback_reply.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "agent.fallback_reply".into(),
                message: "empty fallback is sent as \"(empty response)\"".into(),
            });
        }

        errors
    }

    /// `true` when [`validate`](Self::validate) reports no errors
    /// (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|e| e.severity != ConfigSeverity::Error)
    }
}
