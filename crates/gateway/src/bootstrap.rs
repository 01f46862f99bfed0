//! AppState construction shared by `serve` and the integration tests.
//!
//! [`build_app_state`] takes the external collaborators as trait objects so
//! tests can swap in fakes; [`build_live_state`] wires the real Telegram
//! client, the `claude` CLI and the system clock.

use std::sync::Arc;

use anyhow::Context;

use rb_agent::{AgentBackend, ClaudeCli, ConversationDispatcher};
use rb_domain::clock::{Clock, SystemClock};
use rb_domain::config::{Config, ConfigSeverity, TelegramConfig};
use rb_domain::error::Error;
use rb_sessions::{SessionRegistry, SummaryStore, TranscriptWriter};
use rb_telegram::{ChatTransport, TelegramClient};

use crate::state::AppState;

/// Read the bot token from the environment variable named in the config.
pub fn resolve_token(config: &TelegramConfig) -> Result<String, Error> {
    match std::env::var(&config.token_env) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_owned()),
        Ok(_) => Err(Error::Config(format!("{} is empty", config.token_env))),
        Err(_) => Err(Error::Config(format!("{} is not set", config.token_env))),
    }
}

/// Validate config and wire every component around the given transport,
/// agent backend and clock.
pub fn build_app_state(
    config: Arc<Config>,
    transport: Arc<dyn ChatTransport>,
    backend: Arc<dyn AgentBackend>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Agent ────────────────────────────────────────────────────────
    let dispatcher = ConversationDispatcher::new(backend, config.agent.dispatch_timeout());
    let summarizer = dispatcher
        .with_timeout(config.agent.summarize_timeout())
        .without_diagnostic_fallback();
    tracing::info!(
        dispatch_timeout_secs = config.agent.dispatch_timeout_secs,
        summarize_timeout_secs = config.agent.summarize_timeout_secs,
        "agent dispatcher ready"
    );

    // ── Sessions & durable state ─────────────────────────────────────
    let mut sessions = SessionRegistry::new(config.sessions.idle_timeout());
    let transcripts = if config.state.transcripts {
        let dir = config.state.transcripts_path();
        tracing::info!(path = %dir.display(), "transcripts enabled");
        sessions = sessions.with_transcript_dir(dir.clone());
        Some(Arc::new(TranscriptWriter::new(&dir)))
    } else {
        None
    };

    let summaries = SummaryStore::new(config.state.summaries_path());
    tracing::info!(
        path = %summaries.path().display(),
        idle_timeout_secs = config.sessions.idle_timeout_secs,
        "session store ready"
    );

    Ok(AppState {
        config,
        transport,
        dispatcher: Arc::new(dispatcher),
        summarizer: Arc::new(summarizer),
        sessions: Arc::new(sessions),
        summaries: Arc::new(summaries),
        transcripts,
        clock,
    })
}

/// Production wiring: Telegram over HTTPS, the `claude` CLI, wall-clock time.
pub fn build_live_state(config: Arc<Config>, token: &str) -> anyhow::Result<AppState> {
    let transport =
        TelegramClient::new(&config.telegram, token).context("creating Telegram client")?;
    let backend = ClaudeCli::new(config.agent.clone());
    tracing::info!(
        program = %config.agent.program,
        model = ?config.agent.model,
        workdir = %config.agent.workdir.display(),
        "agent backend ready"
    );
    build_app_state(
        config,
        Arc::new(transport),
        Arc::new(backend),
        Arc::new(SystemClock),
    )
}
