//! Incremental Server-Sent Events decoder
//!
//! Handles `event:` / `data:` fields and comment lines, with `\n` or
//! `\r\n` line endings. `id:` and `retry:` are accepted and ignored since
//! the split transport never reconnects. An event with a line that is not
//! valid UTF-8 is dropped whole.

use crate::error::TransportError;

/// Longest line kept while waiting for its terminator
pub(crate) const MAX_LINE_LEN: usize = 16 * 1024 * 1024;
/// Event name the server uses for map updates
pub(crate) const UPDATE_EVENT: &str = "update";
const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    /// Whether the event carries a map envelope
    pub fn is_update(&self) -> bool {
        self.event == UPDATE_EVENT || self.event == DEFAULT_EVENT
    }
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    invalid: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body, returning every event it completes
    ///
    /// Fails once an unterminated line grows past [`MAX_LINE_LEN`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, TransportError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            match String::from_utf8(line) {
                Ok(line) => {
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    tracing::warn!("Discarding SSE event with invalid UTF-8: {}", e);
                    self.invalid = true;
                }
            }
        }

        if self.buffer.len() > MAX_LINE_LEN {
            return Err(TransportError::Stream(format!(
                "SSE line exceeds {} bytes",
                MAX_LINE_LEN
            )));
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if std::mem::take(&mut self.invalid) {
            self.data.clear();
            return None;
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl SseDecoder {
        fn feed_ok(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
            self.feed(chunk).unwrap()
        }
    }

    #[test]
    fn test_named_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed_ok(b"event: update\ndata: {\"event\":\"clear\"}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "update".into(),
                data: r#"{"event":"clear"}"#.into(),
            }]
        );
        assert!(events[0].is_update());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed_ok(b"event: upd").is_empty());
        assert!(decoder.feed_ok(b"ate\r\ndata: {\"event\":").is_empty());
        let events = decoder.feed_ok(b"\"clear\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "update");
        assert_eq!(events[0].data, r#"{"event":"clear"}"#);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed_ok(b": keep-alive\n\ndata: line one\ndata:line two\nid: 7\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_other_event_names_are_not_updates() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed_ok(b"event: heartbeat\ndata: ping\n\n");
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_update());
    }

    #[test]
    fn test_event_without_data_is_dropped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed_ok(b"event: update\n\n").is_empty());
        let events = decoder.feed_ok(b"data: x\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_invalid_utf8_drops_the_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed_ok(b"event: update\ndata: {\"event\":\"put\",\"key\":\"k\",\"value\":\"\xff\"}\n\n");
        assert!(events.is_empty());

        // The next event decodes normally
        let events = decoder.feed_ok(b"event: update\ndata: {\"event\":\"clear\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, r#"{"event":"clear"}"#);
    }

    #[test]
    fn test_unterminated_line_is_capped() {
        let mut decoder = SseDecoder::new();
        let chunk = vec![b'x'; MAX_LINE_LEN / 2];
        assert!(decoder.feed(&chunk).unwrap().is_empty());
        assert!(decoder.feed(&chunk).unwrap().is_empty());

        let err = decoder.feed(b"xx").unwrap_err();
        assert!(matches!(err, TransportError::Stream(_)));
    }
}
