//! `claude` CLI backend.
//!
//! Spawns one process per prompt with `--output-format stream-json` and
//! turns its stdout into [`AgentEvent`]s.  Stderr is collected on the side
//! and surfaced as a single [`AgentEvent::Diagnostic`] when the process
//! exits without a result.  The child is killed when the event stream is
//! dropped, which is how timeouts cancel it.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use rb_domain::config::AgentConfig;
use rb_domain::error::{Error, Result};
use rb_domain::stream::{AgentEvent, BoxStream};

use crate::backend::{AgentBackend, InvokeRequest, SessionMode};
use crate::parse::parse_line;

pub struct ClaudeCli {
    config: AgentConfig,
}

impl ClaudeCli {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments for one request.
    pub fn args(&self, req: &InvokeRequest) -> Vec<String> {
        let mut args = vec!["-p".to_owned(), req.prompt.clone()];
        if let Some(model) = &self.config.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        args.extend(
            ["--output-format", "stream-json", "--verbose"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(
            match req.mode {
                SessionMode::Create => "--session-id",
                SessionMode::Resume => "--resume",
            }
            .into(),
        );
        args.push(req.session_id.clone());
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait::async_trait]
impl AgentBackend for ClaudeCli {
    async fn start(&self, req: InvokeRequest) -> Result<BoxStream<'static, Result<AgentEvent>>> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.args(&req))
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Agent(format!("failed to spawn {}: {e}", self.config.program))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("agent stdout not captured".into()))?;
        let stderr = child.stderr.take();

        // Drain stderr concurrently so a chatty child never blocks on a
        // full pipe while we are still reading stdout.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let session_id = req.session_id;
        let stream = async_stream::stream! {
            let mut lines = BufReader::new(stdout).lines();
            let mut saw_result = false;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        for event in parse_line(&line) {
                            // A blank result still leaves room for stderr.
                            saw_result |= matches!(
                                &event,
                                AgentEvent::Result { text } if !text.trim().is_empty()
                            );
                            yield Ok(event);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(Error::Io(e));
                        break;
                    }
                }
            }

            match child.wait().await {
                Ok(status) => tracing::debug!(
                    session_id = %session_id,
                    exit_code = ?status.code(),
                    "agent process exited"
                ),
                Err(e) => tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "waiting for agent process failed"
                ),
            }

            let diagnostic = stderr_task.await.unwrap_or_default();
            let diagnostic = diagnostic.trim();
            if !saw_result && !diagnostic.is_empty() {
                yield Ok(AgentEvent::Diagnostic { text: diagnostic.to_owned() });
            }
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "claude-cli"
    }
}
