//! Events delivered to trace subscribers

use serde_json::Value;
use uuid::Uuid;

/// Correlates a streamed request with its subscribers
pub type TraceId = String;

/// Longest error message forwarded to subscribers, in characters
pub const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Generate a fresh trace id
pub fn new_trace_id() -> TraceId {
    Uuid::new_v4().simple().to_string()
}

/// Something that happened on a trace
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A partial result chunk
    Data(Value),
    /// Backend or transport failure
    Error { code: i64, message: String },
    /// The stream ended normally
    Complete,
    /// Subscribers should discard what they accumulated so far
    Reset,
    /// The request was cancelled; no further events follow
    Cancelled,
}

impl StreamEvent {
    /// Error event with the message cut to [`MAX_ERROR_MESSAGE_LEN`]
    pub fn error(code: i64, message: impl AsRef<str>) -> Self {
        StreamEvent::Error {
            code,
            message: truncate_message(message.as_ref()),
        }
    }

    /// No further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Cancelled)
    }
}

/// Cut a message to [`MAX_ERROR_MESSAGE_LEN`] characters
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_LEN) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        let long = "x".repeat(500);
        assert_eq!(truncate_message(&long).len(), MAX_ERROR_MESSAGE_LEN);
        assert_eq!(truncate_message("short"), "short");

        let wide = "é".repeat(400);
        assert_eq!(truncate_message(&wide).chars().count(), MAX_ERROR_MESSAGE_LEN);
    }

    #[test]
    fn test_error_event_truncated() {
        match StreamEvent::error(500, "e".repeat(1000)) {
            StreamEvent::Error { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message.len(), MAX_ERROR_MESSAGE_LEN);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_trace_ids_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
        assert_eq!(new_trace_id().len(), 32);
    }
}
