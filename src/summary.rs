use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::FetchError;

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("summary backend reported: {0}")]
    Upstream(String),
    #[error("malformed summary event: {0}")]
    Malformed(String),
}

impl SummaryError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, SummaryError::Fetch(err) if err.is_aborted())
    }
}

/// True when the article text is long enough to be worth a summary request.
pub fn should_summarize(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().count() >= min_chars
}

/// Splits a chunked event stream into complete events.
///
/// Chunks may cut an event, or a UTF-8 sequence, anywhere; bytes are held
/// until the blank line that terminates the event arrives.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, sep_len)) = find_event_end(&self.buf) {
            let raw: Vec<u8> = self.buf.drain(..end + sep_len).take(end).collect();
            let event = String::from_utf8_lossy(&raw).replace('\r', "");
            if !event.trim().is_empty() {
                events.push(event);
            }
        }
        events
    }

    /// Whatever is left once the stream closes. Non-empty means the last
    /// event was cut short.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SummaryEvent {
    Delta(String),
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize, Default)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn error_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Object(ref map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

impl SummaryEvent {
    /// Interpret one decoded event. Events without a `data:` line (comments,
    /// keep-alives) yield `Ok(None)`.
    pub fn parse(event: &str) -> Result<Option<Self>, SummaryError> {
        let data: Vec<&str> = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|payload| payload.strip_prefix(' ').unwrap_or(payload))
            .collect();
        if data.is_empty() {
            return Ok(None);
        }
        let payload = data.join("\n");
        if payload.trim() == DONE_MARKER {
            return Ok(Some(SummaryEvent::Done));
        }

        let chunk: StreamChunk = serde_json::from_str(&payload)
            .map_err(|err| SummaryError::Malformed(format!("{err}: {payload}")))?;
        if let Some(error) = chunk.error.filter(|e| !e.is_null()) {
            return Err(SummaryError::Upstream(error_text(error)));
        }
        let delta = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .unwrap_or_default();
        Ok(Some(SummaryEvent::Delta(delta)))
    }
}

/// Single-shot reply body.
#[derive(Deserialize, Debug, Default)]
pub struct SummaryReply {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SummaryReply {
    pub fn into_result(self) -> Result<String, SummaryError> {
        match (self.summary, self.error) {
            (_, Some(error)) => Err(SummaryError::Upstream(error)),
            (Some(summary), None) => Ok(summary),
            (None, None) => Err(SummaryError::Malformed(
                "reply has neither summary nor error".to_string(),
            )),
        }
    }
}

/// Accumulates streamed deltas into the displayed summary.
#[derive(Debug, Default)]
pub struct SummaryStream {
    decoder: EventStreamDecoder,
    pub text: String,
    pub done: bool,
}

impl SummaryStream {
    /// Feed one network chunk. Returns true when the displayed text changed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<bool, SummaryError> {
        let mut changed = false;
        for event in self.decoder.push(chunk) {
            if self.done {
                break;
            }
            match SummaryEvent::parse(&event)? {
                Some(SummaryEvent::Delta(delta)) if !delta.is_empty() => {
                    self.text.push_str(&delta);
                    changed = true;
                }
                Some(SummaryEvent::Done) => self.done = true,
                _ => {}
            }
        }
        Ok(changed)
    }

    /// Close the stream. A cut-off trailing event is logged and dropped.
    pub fn finish(self) -> String {
        if let Some(rest) = self.decoder.finish() {
            if !self.done {
                log::warn!("summary stream ended mid-event, dropping {} bytes", rest.len());
            }
        }
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_counts_trimmed_characters() {
        assert!(!should_summarize("", 1));
        assert!(!should_summarize("   \n", 0));
        assert!(!should_summarize("short text", 50));
        assert!(should_summarize(&"字".repeat(50), 50));
    }

    #[test]
    fn decoder_reassembles_split_events() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let events = decoder.push(b":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events, vec!["data: {\"a\":1}", "data: [DONE]"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_keeps_split_utf8_intact() {
        let bytes = "data: 总结\n\n".as_bytes();
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(&bytes[..8]).is_empty());
        assert_eq!(decoder.push(&bytes[8..]), vec!["data: 总结"]);
    }

    #[test]
    fn decoder_accepts_crlf_separators() {
        let mut decoder = EventStreamDecoder::default();
        assert_eq!(decoder.push(b"data: [DONE]\r\n\r\n"), vec!["data: [DONE]"]);
    }

    #[test]
    fn parses_delta_done_and_error() {
        assert_eq!(
            SummaryEvent::parse(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            Some(SummaryEvent::Delta("Hi".to_string()))
        );
        assert_eq!(SummaryEvent::parse("data: [DONE]").unwrap(), Some(SummaryEvent::Done));
        assert_eq!(SummaryEvent::parse(": keep-alive").unwrap(), None);
        assert_eq!(
            SummaryEvent::parse(r#"data: {"error": "quota"}"#),
            Err(SummaryError::Upstream("quota".to_string()))
        );
        assert!(matches!(
            SummaryEvent::parse("data: {not json"),
            Err(SummaryError::Malformed(_))
        ));
    }

    #[test]
    fn stream_accumulates_until_done() {
        let mut stream = SummaryStream::default();
        let changed = stream
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Rust \"}}]}\n\ndata: {\"choices\":[{\"delta\":{}}]}\n\n")
            .unwrap();
        assert!(changed);
        stream
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"docs\"}}]}\n\ndata: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n\n")
            .unwrap();
        assert!(stream.done);
        assert_eq!(stream.finish(), "Rust docs");
    }

    #[test]
    fn truncated_tail_is_not_an_error() {
        let mut stream = SummaryStream::default();
        stream
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: {\"choi")
            .unwrap();
        assert_eq!(stream.finish(), "ok");
    }

    #[test]
    fn single_shot_reply() {
        let reply: SummaryReply = serde_json::from_str(r#"{"summary":"short"}"#).unwrap();
        assert_eq!(reply.into_result(), Ok("short".to_string()));
        let reply: SummaryReply = serde_json::from_str(r#"{"error":"empty content"}"#).unwrap();
        assert_eq!(
            reply.into_result(),
            Err(SummaryError::Upstream("empty content".to_string()))
        );
        assert!(SummaryReply::default().into_result().is_err());
    }

    #[test]
    fn aborted_fetch_is_recognised() {
        assert!(SummaryError::from(FetchError::Aborted).is_aborted());
        assert!(!SummaryError::Malformed(String::new()).is_aborted());
    }
}
