//! reqwest-backed Bot API client.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use rb_domain::config::TelegramConfig;
use rb_domain::error::{Error, Result};
use rb_domain::ChatId;

use crate::transport::ChatTransport;
use crate::types::{ApiResponse, GetUpdatesParams, RawUpdate, SendMessageParams, Update};

const ALLOWED_UPDATES: &[&str] = &["message"];

/// Extra time on top of the long-poll wait before the HTTP request itself
/// is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_base}/bot{token}`.  Never logged.
    endpoint: String,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config("bot token is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token.trim()),
            request_timeout: config.request_timeout(),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body: ApiResponse<T> = resp.json().await.map_err(from_reqwest)?;

        if !body.ok {
            return Err(Error::Transport(format!(
                "{method}: HTTP {} - {}",
                status.as_u16(),
                body.description.as_deref().unwrap_or("no description")
            )));
        }
        body.result
            .ok_or_else(|| Error::Transport(format!("{method}: ok response without result")))
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramClient {
    async fn get_updates(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>> {
        let params = GetUpdatesParams {
            timeout: wait.as_secs(),
            offset,
            allowed_updates: ALLOWED_UPDATES,
        };
        let http_timeout = self.request_timeout.max(wait + POLL_GRACE);
        let raw: Vec<RawUpdate> = self.call("getUpdates", &params, http_timeout).await?;

        let mut updates: Vec<Update> = raw.into_iter().map(Update::from).collect();
        updates.sort_by_key(|u| u.update_id);
        tracing::debug!(offset = ?offset, count = updates.len(), "fetched updates");
        Ok(updates)
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let params = SendMessageParams { chat_id, text };
        let _: serde_json::Value = self
            .call("sendMessage", &params, self.request_timeout)
            .await?;
        Ok(())
    }
}

/// reqwest errors carry the request URL, which embeds the bot token.
fn from_reqwest(e: reqwest::Error) -> Error {
    let e = e.without_url();
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
