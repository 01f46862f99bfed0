//! Outbound message splitting.

use rb_domain::error::Result;
use rb_domain::ChatId;

use crate::transport::ChatTransport;

/// Split `text` into pieces of at most `max_chars` characters, cutting on
/// character boundaries only.  A text of `n` characters yields
/// `ceil(n / max_chars)` pieces; empty text yields none.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_owned()]
        };
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_owned());
        rest = tail;
    }
    chunks
}

/// Send `text` as consecutive messages of at most `max_chars` characters,
/// in order.  Stops at the first failed piece.  Returns the number sent.
pub async fn send_chunked(
    transport: &dyn ChatTransport,
    chat_id: ChatId,
    text: &str,
    max_chars: usize,
) -> Result<usize> {
    let chunks = split_message(text, max_chars);
    for chunk in &chunks {
        transport.send_message(chat_id, chunk).await?;
    }
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;
    use rb_domain::error::Error;

    use crate::types::Update;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn long_text_splits_into_ceil_pieces() {
        let text = "a".repeat(10_000);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 4096);
        assert_eq!(chunks[2].len(), 10_000 - 2 * 4096);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        assert_eq!(split_message("abcdef", 3), vec!["abc", "def"]);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "héllo wörld ✓✓✓";
        let chunks = split_message(text, 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.len(), (text.chars().count() + 3) / 4);
        assert_eq!(chunks.concat(), text);
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        fail_after: Option<usize>,
    }

    #[async_trait::async_trait]
    impl ChatTransport for Recorder {
        async fn get_updates(&self, _offset: Option<i64>, _wait: Duration) -> Result<Vec<Update>> {
            Ok(Vec::new())
        }

        async fn send_message(&self, _chat_id: ChatId, text: &str) -> Result<()> {
            let mut sent = self.sent.lock();
            if self.fail_after.is_some_and(|n| sent.len() >= n) {
                return Err(Error::Transport("boom".into()));
            }
            sent.push(text.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn chunks_are_sent_in_order() {
        let recorder = Recorder::default();
        let n = send_chunked(&recorder, 42, "abcdefg", 3).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(*recorder.sent.lock(), vec!["abc", "def", "g"]);
    }

    #[tokio::test]
    async fn send_stops_at_first_failure() {
        let recorder = Recorder {
            fail_after: Some(1),
            ..Recorder::default()
        };
        let err = send_chunked(&recorder, 42, "abcdefg", 3).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(*recorder.sent.lock(), vec!["abc"]);
    }
}
