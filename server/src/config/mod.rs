use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise summarization assistant. \
Summarize the user's content as one continuous paragraph of plain text, \
without bullet points or line breaks, in no more than 100 words.";

/// Server configuration. Every field can be overridden by a `DOCVIEW_*`
/// environment variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub content_dir: PathBuf,
    pub manifest_name: String,
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub index_ttl: Duration,
    pub replay_chunk_chars: usize,
    pub replay_delay: Duration,
    /// Most summaries kept in memory before the oldest are dropped.
    pub summary_cache_capacity: usize,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            content_dir: PathBuf::from("."),
            manifest_name: "content.md".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            upstream_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            index_ttl: Duration::from_secs(60),
            replay_chunk_chars: 5,
            replay_delay: Duration::from_millis(50),
            summary_cache_capacity: 256,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source. Unparseable
    /// numbers keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(dir) = lookup("DOCVIEW_CONTENT_DIR") {
            config.content_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("DOCVIEW_MANIFEST") {
            config.manifest_name = name;
        }
        if let Some(host) = lookup("DOCVIEW_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("DOCVIEW_PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(url) = lookup("DOCVIEW_UPSTREAM_URL") {
            config.upstream_url = url;
        }
        config.api_key = lookup("DOCVIEW_API_KEY").filter(|key| !key.is_empty());
        if let Some(model) = lookup("DOCVIEW_MODEL") {
            config.model = model;
        }
        if let Some(prompt) = lookup("DOCVIEW_SYSTEM_PROMPT") {
            config.system_prompt = prompt;
        }
        if let Some(secs) = lookup("DOCVIEW_INDEX_TTL_SECS").and_then(|s| s.parse().ok()) {
            config.index_ttl = Duration::from_secs(secs);
        }
        if let Some(chars) = lookup("DOCVIEW_REPLAY_CHUNK")
            .and_then(|s| s.parse().ok())
            .filter(|chars: &usize| *chars > 0)
        {
            config.replay_chunk_chars = chars;
        }
        if let Some(ms) = lookup("DOCVIEW_REPLAY_DELAY_MS").and_then(|s| s.parse().ok()) {
            config.replay_delay = Duration::from_millis(ms);
        }
        if let Some(capacity) = lookup("DOCVIEW_SUMMARY_CACHE")
            .and_then(|s| s.parse().ok())
            .filter(|capacity: &usize| *capacity > 0)
        {
            config.summary_cache_capacity = capacity;
        }
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("DOCVIEW_CONTENT_DIR", "/srv/docs"),
            ("DOCVIEW_PORT", "8080"),
            ("DOCVIEW_API_KEY", "secret"),
            ("DOCVIEW_REPLAY_CHUNK", "0"),
            ("DOCVIEW_INDEX_TTL_SECS", "soon"),
            ("DOCVIEW_SUMMARY_CACHE", "32"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.content_dir, PathBuf::from("/srv/docs"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.replay_chunk_chars, 5);
        assert_eq!(config.index_ttl, Duration::from_secs(60));
        assert_eq!(config.summary_cache_capacity, 32);
    }

    #[test]
    fn empty_api_key_is_absent() {
        let config = Config::from_lookup(|key| (key == "DOCVIEW_API_KEY").then(String::new));
        assert_eq!(config.api_key, None);
    }
}
