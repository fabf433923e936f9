//! Incremental decoder for `text/event-stream` bodies
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers partial
//! lines and returns every event completed by the chunk. Field handling
//! follows the EventSource processing model:
//!
//! - a leading U+FEFF byte order mark is skipped
//! - lines end with `\n`, `\r\n` or `\r`
//! - lines starting with `:` are comments
//! - `data` lines accumulate, joined with `\n`
//! - a blank line dispatches the pending event; an event without data is
//!   discarded
//! - `id` and `retry` persist across events

use std::time::Duration;

/// Event type used when the server does not send an `event:` field
pub const DEFAULT_EVENT_TYPE: &str = "message";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// A dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`message` unless the server named it)
    pub event: String,
    /// Event data, multi-line values joined with `\n`
    pub data: String,
    /// Last event ID seen when this event was dispatched
    pub id: Option<String>,
}

impl SseEvent {
    pub fn is_error(&self) -> bool {
        self.event == "error"
    }
}

/// Stateful line decoder for one connection
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    skip_lf: bool,
    /// Set once the start of the stream has been checked for a BOM
    started: bool,
    event_type: String,
    data: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning the events it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if !self.started {
                if self.line.len() < BOM.len() && byte == BOM[self.line.len()] {
                    self.line.push(byte);
                    if self.line.len() == BOM.len() {
                        self.line.clear();
                        self.started = true;
                    }
                    continue;
                }
                // not a BOM: bytes held so far are ordinary line content
                self.started = true;
            }

            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.skip_lf = true;
                    self.end_line(&mut events);
                }
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// Drop any partially received event (end of stream)
    pub fn reset(&mut self) {
        self.line.clear();
        self.skip_lf = false;
        self.event_type.clear();
        self.data.clear();
    }

    /// Last `id` field received, used for `Last-Event-ID` on reconnect
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay requested by the server
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.line);

        if raw.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        let line = String::from_utf8_lossy(&raw);
        if line.starts_with(':') {
            return;
        }

        match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.process_field(&line[..pos], value);
            }
            None => self.process_field(&line, ""),
        }
    }

    fn process_field(&mut self, field: &str, value: &str) {
        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            other => tracing::trace!("Ignoring unknown SSE field: {}", other),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);

        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            event: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"is_playing\": false}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"is_playing\": false}");
        assert!(events[0].id.is_none());
    }

    #[test]
    fn test_named_error_event() {
        let mut decoder = SseDecoder::new();
        let events =
            decoder.feed(b"event: error\ndata: {\"status_code\": 401}\n\ndata: next\n\n");

        assert_eq!(events.len(), 2);
        assert!(events[0].is_error());
        assert_eq!(events[0].data, "{\"status_code\": 401}");
        // event type does not leak into the following event
        assert_eq!(events[1].event, "message");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: hel").is_empty());
        assert!(decoder.feed(b"lo\r").is_empty());
        let events = decoder.feed(b"\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\ndata: line one\ndata:line two\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_bare_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: error\rdata: boom\r\r");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "error");
        assert_eq!(events[0].data, "boom");
    }

    #[test]
    fn test_event_without_data_is_dropped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\n\n: comment only\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_id_and_retry_persist() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\nretry: 5000\ndata: a\n\ndata: b\n\nretry: soon\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
        assert_eq!(decoder.retry(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_field_without_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data\n\ndata\ndata\n\n");

        // A lone "data" line appends an empty line: the first event has
        // empty data after trimming and is still dispatched.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "");
        assert_eq!(events[1].data, "\n");
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"\xEF\xBB\xBFdata: first\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first");
    }

    #[test]
    fn test_bom_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"\xEF").is_empty());
        assert!(decoder.feed(b"\xBB\xBFdata: fi").is_empty());
        let events = decoder.feed(b"rst\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first");
    }

    #[test]
    fn test_bom_only_skipped_at_stream_start() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\n\n\xEF\xBB\xBFdata: b\n\n");

        // the second BOM makes an unknown field name: its data is ignored
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn test_reset_discards_partial_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());

        decoder.reset();
        assert!(decoder.feed(b"\n").is_empty());
    }
}
