use serde::{Deserialize, Serialize};

use rb_domain::ChatId;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) ok: bool,
    pub(crate) result: Option<T>,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUpdate {
    pub(crate) update_id: i64,
    #[serde(default)]
    pub(crate) message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) chat: Option<RawChat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChat {
    pub(crate) id: ChatId,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesParams<'a> {
    pub(crate) timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) offset: Option<i64>,
    pub(crate) allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageParams<'a> {
    pub(crate) chat_id: ChatId,
    pub(crate) text: &'a str,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Update
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One platform update, reduced to what the relay uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub chat_id: Option<ChatId>,
    pub text: Option<String>,
}

impl Update {
    pub fn text_message(update_id: i64, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            update_id,
            chat_id: Some(chat_id),
            text: Some(text.into()),
        }
    }

    /// The chat and text of this update, if it is a non-empty text message.
    pub fn message(&self) -> Option<(ChatId, &str)> {
        let chat_id = self.chat_id.filter(|id| *id != 0)?;
        let text = self.text.as_deref().filter(|t| !t.is_empty())?;
        Some((chat_id, text))
    }
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let (chat_id, text) = match raw.message {
            Some(m) => (m.chat.map(|c| c.id), m.text),
            None => (None, None),
        };
        Self {
            update_id: raw.update_id,
            chat_id,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_updates_response() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "text": "hello", "chat": {"id": 42, "type": "private"}}},
                {"update_id": 11, "message": {"message_id": 2, "chat": {"id": 42}, "photo": []}},
                {"update_id": 12, "edited_message": {"text": "x"}}
            ]
        }"#;
        let resp: ApiResponse<Vec<RawUpdate>> = serde_json::from_str(body).unwrap();
        assert!(resp.ok);
        let updates: Vec<Update> = resp.result.unwrap().into_iter().map(Update::from).collect();

        assert_eq!(updates[0].message(), Some((42, "hello")));
        assert_eq!(updates[1].message(), None);
        assert_eq!(updates[2].message(), None);
        assert_eq!(updates[2].update_id, 12);
    }

    /// Decodes the envelope for any payload type, as the client does.
    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> ApiResponse<T> {
        serde_json::from_str(body).unwrap()
    }

    #[derive(Debug, Deserialize)]
    struct Sent {
        message_id: i64,
    }

    #[test]
    fn envelope_decodes_payloads_without_default() {
        let resp: ApiResponse<Sent> = decode(r#"{"ok": true, "result": {"message_id": 7}}"#);
        assert_eq!(resp.result.unwrap().message_id, 7);
        assert!(resp.description.is_none());
    }

    #[test]
    fn error_response_has_description() {
        let body = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let resp: ApiResponse<Vec<RawUpdate>> = decode(body);
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn get_updates_params_omit_unset_offset() {
        let params = GetUpdatesParams {
            timeout: 30,
            offset: None,
            allowed_updates: &["message"],
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"timeout": 30, "allowed_updates": ["message"]})
        );
    }
}
