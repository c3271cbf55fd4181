//! Framing for streamed search responses
//!
//! The backend streams either newline-delimited JSON or Server-Sent Events.
//! Both are line oriented, so bytes are buffered until a `\n` arrives and
//! each complete line is decoded on its own.

use serde_json::Value;

/// Payload marking the end of an SSE stream
pub const DONE_MARKER: &str = "[[DONE]]";

/// A decoded line of a streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A partial result
    Chunk(Value),
    /// An `{code, message}` envelope with `code > 200`
    Error { code: i64, message: String },
    /// End-of-stream marker
    Done,
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    malformed: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every message completed by them
    ///
    /// Carried-over bytes hold no newline, so only the new bytes are scanned
    /// and the buffer is compacted once per call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamMessage> {
        let mut buffer = std::mem::take(&mut self.buffer);
        let mut cursor = buffer.len();
        buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        let mut start = 0;
        while let Some(offset) = buffer[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            if let Some(message) = self.decode(&buffer[start..end]) {
                messages.push(message);
            }
            start = end + 1;
            cursor = start;
        }

        buffer.drain(..start);
        self.buffer = buffer;
        messages
    }

    /// Decode whatever is left once the byte stream ends
    pub fn finish(&mut self) -> Option<StreamMessage> {
        let line = std::mem::take(&mut self.buffer);
        self.decode(&line)
    }

    /// Lines that looked like payloads but were not valid JSON
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn decode(&mut self, line: &[u8]) -> Option<StreamMessage> {
        let text = String::from_utf8_lossy(line);
        let payload = payload_of(text.trim())?;

        if payload == DONE_MARKER {
            return Some(StreamMessage::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Some(classify(value)),
            Err(e) => {
                self.malformed += 1;
                tracing::warn!(error = %e, "Skipping malformed stream line");
                None
            }
        }
    }
}

/// Strip SSE framing; `None` for lines that carry no payload
fn payload_of(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim();
        return (!data.is_empty()).then_some(data);
    }

    let is_sse_field = ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field));
    if is_sse_field {
        None
    } else {
        Some(line)
    }
}

fn classify(value: Value) -> StreamMessage {
    let code = value.get("code").and_then(Value::as_i64);

    match code {
        Some(code) if code > 200 => {
            let message = value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            StreamMessage::Error { code, message }
        }
        _ => StreamMessage::Chunk(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ndjson_lines() {
        let mut decoder = LineDecoder::new();
        let messages = decoder.push(b"{\"hits\":[1]}\n{\"hits\":[2]}\n");
        assert_eq!(
            messages,
            vec![
                StreamMessage::Chunk(json!({"hits": [1]})),
                StreamMessage::Chunk(json!({"hits": [2]})),
            ]
        );
    }

    #[test]
    fn test_line_split_across_pushes() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"hits\":").is_empty());
        assert!(decoder.push(b"[1,2]").is_empty());
        let messages = decoder.push(b"}\r\n{\"a\"");
        assert_eq!(messages, vec![StreamMessage::Chunk(json!({"hits": [1, 2]}))]);

        decoder.push(b":1}");
        assert_eq!(decoder.finish(), Some(StreamMessage::Chunk(json!({"a": 1}))));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_sse_framing() {
        let mut decoder = LineDecoder::new();
        let body = b": keepalive\nevent: search_response\nid: 1\ndata: {\"total\": 3}\n\ndata: [[DONE]]\n";
        let messages = decoder.push(body);
        assert_eq!(
            messages,
            vec![StreamMessage::Chunk(json!({"total": 3})), StreamMessage::Done]
        );
    }

    #[test]
    fn test_error_envelope() {
        let mut decoder = LineDecoder::new();
        let messages = decoder.push(b"{\"code\":500,\"message\":\"query failed\"}\n{\"code\":200,\"hits\":[]}\n");
        assert_eq!(
            messages,
            vec![
                StreamMessage::Error {
                    code: 500,
                    message: "query failed".to_string()
                },
                StreamMessage::Chunk(json!({"code": 200, "hits": []})),
            ]
        );
    }

    #[test]
    fn test_malformed_line_skipped() {
        let mut decoder = LineDecoder::new();
        let messages = decoder.push(b"not json\n{\"ok\":true}\n");
        assert_eq!(messages, vec![StreamMessage::Chunk(json!({"ok": true}))]);
        assert_eq!(decoder.malformed(), 1);
    }

    #[test]
    fn test_large_body_in_one_push() {
        let mut decoder = LineDecoder::new();
        let mut body: String = (0..50_000).map(|i| format!("{{\"n\":{}}}\n", i)).collect();
        body.push_str("{\"n\":");

        let messages = decoder.push(body.as_bytes());
        assert_eq!(messages.len(), 50_000);
        assert_eq!(messages[49_999], StreamMessage::Chunk(json!({"n": 49_999})));

        // the trailing partial line is carried into the next push
        let messages = decoder.push(b"-1}\n");
        assert_eq!(messages, vec![StreamMessage::Chunk(json!({"n": -1}))]);
        assert_eq!(decoder.finish(), None);
    }
}
