use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::errors::ServerError;

pub const DONE_EVENT: &str = "data: [DONE]\n\n";

pub fn content_key(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

pub fn delta_event(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "delta": { "content": text } }] })
    )
}

pub fn error_event(message: &str) -> String {
    format!("data: {}\n\n", json!({ "error": message }))
}

/// Split a cached summary into delta events of `chunk_chars` characters.
pub fn replay_events(summary: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = summary.chars().collect();
    let mut events: Vec<String> = chars
        .chunks(chunk_chars.max(1))
        .map(|chunk| delta_event(&chunk.iter().collect::<String>()))
        .collect();
    events.push(DONE_EVENT.to_string());
    events
}

/// `choices[0].delta.content` of an upstream chunk, if any.
pub fn delta_content(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Reassembles `\n`-terminated lines from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// `data:` payloads of an upstream event stream, in order.
pub struct UpstreamEvents {
    bytes: ByteStream,
    lines: LineBuffer,
    ready: VecDeque<String>,
    finished: bool,
}

impl UpstreamEvents {
    pub fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            lines: LineBuffer::default(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    pub async fn next_data(&mut self) -> Option<Result<String, ServerError>> {
        loop {
            if let Some(data) = self.ready.pop_front() {
                return Some(Ok(data));
            }
            if self.finished {
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = self.lines.push(&chunk);
                    self.queue(lines);
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
                None => {
                    self.finished = true;
                    let rest = std::mem::take(&mut self.lines).finish();
                    self.queue(rest);
                }
            }
        }
    }

    fn queue(&mut self, lines: impl IntoIterator<Item = String>) {
        self.ready.extend(
            lines
                .into_iter()
                .filter_map(|line| line.strip_prefix("data:").map(|d| d.trim().to_string())),
        );
    }
}

#[derive(Default)]
struct CacheEntries {
    summaries: HashMap<String, String>,
    order: VecDeque<String>,
}

/// In-memory summary cache keyed by content hash. Holds at most `capacity`
/// summaries; the oldest insertion is evicted first.
pub struct SummaryCache {
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

impl SummaryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.summaries.get(key).cloned()
    }

    pub fn insert(&self, key: String, summary: String) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.summaries.insert(key.clone(), summary).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.summaries.remove(&oldest);
            }
        }
    }
}

pub struct SummaryService {
    config: Arc<Config>,
    client: reqwest::Client,
    cache: SummaryCache,
}

impl SummaryService {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            cache: SummaryCache::new(config.summary_cache_capacity),
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    async fn open_upstream(&self, content: &str) -> Result<UpstreamEvents, ServerError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": self.config.system_prompt },
                { "role": "user", "content": content },
            ],
            "stream": true,
        });
        let mut request = self.client.post(&self.config.upstream_url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Upstream(format!(
                "upstream request failed: {}",
                status.as_u16()
            )));
        }
        Ok(UpstreamEvents::new(response.bytes_stream().boxed()))
    }

    /// Summary as a stream of event-stream frames. Cached summaries are
    /// replayed in small chunks; fresh ones are relayed from upstream and
    /// cached once complete.
    pub fn stream(
        self: Arc<Self>,
        content: String,
    ) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
        let (mut tx, rx) = mpsc::channel::<Result<String, Infallible>>(16);
        tokio::spawn(async move {
            let key = content_key(&content);
            if let Some(summary) = self.cache.get(&key) {
                log::info!("replaying cached summary {}", &key[..8]);
                for event in replay_events(&summary, self.config.replay_chunk_chars) {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(self.config.replay_delay).await;
                }
                return;
            }

            let mut events = match self.open_upstream(&content).await {
                Ok(events) => events,
                Err(err) => {
                    log::error!("summary upstream unavailable: {err}");
                    let _ = tx.send(Ok(error_event(&err.to_string()))).await;
                    return;
                }
            };

            let mut summary = String::new();
            while let Some(data) = events.next_data().await {
                let data = match data {
                    Ok(data) => data,
                    Err(err) => {
                        log::error!("summary stream broke off: {err}");
                        let _ = tx.send(Ok(error_event(&err.to_string()))).await;
                        return;
                    }
                };
                if data != "[DONE]" {
                    if let Some(delta) = delta_content(&data) {
                        summary.push_str(&delta);
                    }
                }
                if tx.send(Ok(format!("data: {data}\n\n"))).await.is_err() {
                    log::debug!("summary client went away");
                    return;
                }
            }

            if !summary.is_empty() {
                log::info!("caching summary {}", &key[..8]);
                self.cache.insert(key, summary);
            }
        });
        rx
    }

    /// Whole summary in one piece.
    pub async fn summarize(&self, content: &str) -> Result<String, ServerError> {
        let key = content_key(content);
        if let Some(summary) = self.cache.get(&key) {
            return Ok(summary);
        }
        let mut events = self.open_upstream(content).await?;
        let mut summary = String::new();
        while let Some(data) = events.next_data().await {
            let data = data?;
            if data == "[DONE]" {
                break;
            }
            if let Some(delta) = delta_content(&data) {
                summary.push_str(&delta);
            }
        }
        if summary.is_empty() {
            return Err(ServerError::Upstream("upstream returned no summary".to_string()));
        }
        self.cache.insert(key, summary.clone());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replay_chunks_by_characters_and_ends_with_done() {
        let events = replay_events("总结很短的文字", 5);
        assert_eq!(
            events,
            vec![
                delta_event("总结很短的"),
                delta_event("文字"),
                DONE_EVENT.to_string(),
            ]
        );
        assert_eq!(delta_content(events[0].trim_start_matches("data: ").trim()).as_deref(), Some("总结很短的"));
    }

    #[test]
    fn quotes_in_summaries_stay_valid_json() {
        let event = delta_event("say \"hi\"");
        let data = event.trim_start_matches("data: ").trim();
        assert_eq!(delta_content(data).as_deref(), Some("say \"hi\""));
        assert_eq!(
            error_event("upstream request failed: 500"),
            "data: {\"error\":\"upstream request failed: 500\"}\n\n"
        );
    }

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\n\r\ndata: [DO"), vec!["data: {\"a\":1}"]);
        assert_eq!(lines.push(b"NE]\n"), vec!["data: [DONE]"]);
        lines.push(b"data: tail");
        assert_eq!(lines.finish().as_deref(), Some("data: tail"));
    }

    #[test]
    fn cache_evicts_oldest_beyond_capacity() {
        let cache = SummaryCache::new(2);
        cache.insert("a".to_string(), "first".to_string());
        cache.insert("b".to_string(), "second".to_string());
        cache.insert("a".to_string(), "first again".to_string());
        cache.insert("c".to_string(), "third".to_string());

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b").as_deref(), Some("second"));
        assert_eq!(cache.get("c").as_deref(), Some("third"));
    }

    #[test]
    fn content_key_is_sha256_hex() {
        assert_eq!(
            content_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn upstream_events_yield_data_payloads() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b": keep-alive\n\ndata: {\"choices\":[{\"delta\":")),
            Ok(Bytes::from_static(b"{\"content\":\"Hi\"}}]}\n\ndata: [DONE]")),
        ];
        let mut events = UpstreamEvents::new(futures::stream::iter(chunks).boxed());

        let first = events.next_data().await.unwrap().unwrap();
        assert_eq!(delta_content(&first).as_deref(), Some("Hi"));
        assert_eq!(events.next_data().await.unwrap().unwrap(), "[DONE]");
        assert!(events.next_data().await.is_none());
    }

    #[tokio::test]
    async fn cached_summary_streams_without_upstream() {
        let config = Config {
            upstream_url: "http://127.0.0.1:9/unreachable".to_string(),
            replay_delay: std::time::Duration::ZERO,
            ..Config::new()
        };
        let service = Arc::new(SummaryService::new(Arc::new(config)));
        service
            .cache()
            .insert(content_key("some article"), "Short.".to_string());

        let frames: Vec<String> = service
            .clone()
            .stream("some article".to_string())
            .map(|frame| match frame {
                Ok(frame) => frame,
                Err(never) => match never {},
            })
            .collect()
            .await;
        assert_eq!(frames, vec![delta_event("Short"), delta_event("."), DONE_EVENT.to_string()]);
        assert_eq!(service.summarize("some article").await.unwrap(), "Short.");
    }
}
