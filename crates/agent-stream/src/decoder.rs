use memchr::memchr;

use crate::errors::ProtocolError;
use crate::event::{EventKind, EventPayload};

/// Prefix marking an event line in the response body.
pub const EVENT_PREFIX: &str = "data: ";

/// Splits a chunked byte stream into text lines.
///
/// Splitting happens on raw bytes, before UTF-8 decoding. `\n` never occurs
/// inside a multi-byte sequence, so characters cut across chunk boundaries are
/// reassembled before they are decoded.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to contain no newline.
    scanned: usize,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = memchr(b'\n', &self.buf[from..]) {
            let end = from + offset;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        lines
    }

    /// Returns the unterminated remainder at end of data, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        self.scanned = 0;
        Some(line).filter(|l| !l.is_empty())
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// An event line after JSON decoding, before dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct WireEvent {
    /// Raw `type` value; `None` when absent or not a string.
    pub event_type: Option<String>,
    pub payload: EventPayload,
}

impl WireEvent {
    /// Known event kind, if the `type` value is recognized.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.as_deref().and_then(EventKind::parse)
    }
}

/// Parses one line of the body.
///
/// Returns `None` for lines that do not start with [`EVENT_PREFIX`] (blank
/// separators, comments, other SSE fields).
pub fn parse_event_line(line: &str) -> Option<Result<WireEvent, ProtocolError>> {
    let raw = line.strip_prefix(EVENT_PREFIX)?;
    Some(parse_event_json(raw))
}

fn parse_event_json(raw: &str) -> Result<WireEvent, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::new(format!("invalid JSON: {e}"), raw))?;
    let serde_json::Value::Object(mut fields) = value else {
        return Err(ProtocolError::new("event is not a JSON object", raw));
    };
    let event_type = match fields.remove("type") {
        Some(serde_json::Value::String(t)) => Some(t),
        _ => None,
    };
    let payload: EventPayload = serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| ProtocolError::new(format!("unexpected field shape: {e}"), raw))?;
    Ok(WireEvent {
        event_type,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        "data: {\"type\":\"progress\",\"step\":\"initializing\",\"progress\":0.0,\"message\":\"Démarrage…\",\"session_id\":\"s1\"}\n\n",
        "data: {\"type\":\"data\",\"message\":\"héllo 🌍 wörld\",\"session_id\":\"s1\"}\r\n\r\n",
        "data: {\"type\":\"complete\",\"progress\":1.0}\n\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<WireEvent> {
        let mut decoder = LineDecoder::default();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push(chunk));
        }
        lines.extend(decoder.finish());
        lines
            .iter()
            .filter_map(|line| parse_event_line(line))
            .map(|parsed| parsed.expect("valid event"))
            .collect()
    }

    #[test]
    fn every_split_point_decodes_like_the_whole_body() {
        let bytes = BODY.as_bytes();
        let whole = decode_all(&[bytes]);
        assert_eq!(whole.len(), 3);
        assert_eq!(whole[1].payload.message.as_deref(), Some("héllo 🌍 wörld"));

        // Includes splits inside the multi-byte sequences of é, … and 🌍.
        for split in 1..bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_all(&[a, b]), whole, "split at byte {split}");
        }
    }

    #[test]
    fn byte_at_a_time_delivery_matches_whole_body() {
        let bytes = BODY.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&chunks), decode_all(&[bytes]));
    }

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"data: {\"type\":\"da").is_empty());
        assert_eq!(decoder.pending(), 17);
        let lines = decoder.push(b"ta\"}\nrest");
        assert_eq!(lines, vec!["data: {\"type\":\"data\"}".to_string()]);
        assert_eq!(decoder.finish().as_deref(), Some("rest"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn long_line_in_small_chunks_is_scanned_once() {
        let mut decoder = LineDecoder::default();
        let line = format!("data: {{\"type\":\"data\",\"message\":\"{}\"}}", "x".repeat(4096));
        for chunk in line.as_bytes().chunks(7) {
            assert!(decoder.push(chunk).is_empty());
            // Every held-back byte has been searched already.
            assert_eq!(decoder.scanned, decoder.pending());
        }
        let lines = decoder.push(b"\nnext");
        assert_eq!(lines, vec![line]);
        assert_eq!(decoder.scanned, 4);
        assert_eq!(decoder.push(b"\n"), vec!["next".to_string()]);
        assert_eq!((decoder.scanned, decoder.pending()), (0, 0));
    }

    #[test]
    fn only_prefixed_lines_are_events() {
        assert!(parse_event_line("").is_none());
        assert!(parse_event_line(": keep-alive").is_none());
        assert!(parse_event_line("event: message").is_none());
        assert!(parse_event_line("data:{\"type\":\"data\"}").is_none());
        assert!(parse_event_line("data: {\"type\":\"data\"}").is_some());
    }

    #[test]
    fn malformed_lines_are_protocol_errors() {
        let err = parse_event_line("data: {not json")
            .expect("prefixed")
            .expect_err("malformed");
        assert_eq!(err.line, "{not json");

        let err = parse_event_line("data: [1,2]")
            .expect("prefixed")
            .expect_err("not an object");
        assert!(err.reason.contains("not a JSON object"));

        let err = parse_event_line("data: {\"type\":\"progress\",\"progress\":\"half\"}")
            .expect("prefixed")
            .expect_err("bad field");
        assert!(err.reason.contains("unexpected field shape"));
    }

    #[test]
    fn type_is_split_from_the_payload() {
        let event = parse_event_line(
            "data: {\"type\":\"data\",\"message\":\"hi\",\"session_id\":\"abc\"}",
        )
        .expect("prefixed")
        .expect("valid");
        assert_eq!(event.kind(), Some(EventKind::Data));
        assert_eq!(event.payload.message.as_deref(), Some("hi"));
        assert!(!event.payload.extra.contains_key("type"));

        let untyped = parse_event_line("data: {\"message\":\"hi\"}")
            .expect("prefixed")
            .expect("valid");
        assert_eq!(untyped.event_type, None);
        assert_eq!(untyped.kind(), None);
    }
}
