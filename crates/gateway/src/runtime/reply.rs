//! Turning agent output into chat messages.

/// Sent when the agent answered with nothing at all.
pub const EMPTY_REPLY: &str = "(empty response)";

/// Split a reply into separate messages on `marker`.
///
/// Parts are trimmed and empty parts dropped.  A reply with no visible
/// content becomes a single [`EMPTY_REPLY`].  An empty marker disables
/// splitting.
pub fn reply_parts(text: &str, marker: &str) -> Vec<String> {
    let parts: Vec<String> = if marker.is_empty() {
        vec![text.trim().to_owned()]
    } else {
        text.split(marker).map(|p| p.trim().to_owned()).collect()
    };

    let parts: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        vec![EMPTY_REPLY.to_owned()]
    } else {
        parts
    }
}
