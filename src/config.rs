use serde::{Deserialize, Serialize};
use std::time::Duration;
use wasm_bindgen::JsValue;

/// How the summary endpoint's reply is consumed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
    #[default]
    Streaming,
    SingleShot,
}

/// Client settings. Every field has a default so a partial
/// `window.DOCVIEW_CONFIG` object only overrides what it names.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub manifest_path: String,
    pub home_document: String,
    pub home_route: String,
    pub default_extension: String,
    pub summary_endpoint: String,
    pub search_endpoint: String,
    pub summary_mode: SummaryMode,
    pub min_summary_chars: usize,
    pub search_debounce_ms: u32,
    pub summary_settle_ms: u32,
    pub collapse_delay_ms: u32,
    pub blur_grace_ms: u32,
    pub narrow_viewport_px: f64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: "/content.md".to_string(),
            home_document: "/home.md".to_string(),
            home_route: "home".to_string(),
            default_extension: "md".to_string(),
            summary_endpoint: "/api/summary".to_string(),
            search_endpoint: "/api/search".to_string(),
            summary_mode: SummaryMode::Streaming,
            min_summary_chars: 50,
            search_debounce_ms: 300,
            summary_settle_ms: 500,
            collapse_delay_ms: 50,
            blur_grace_ms: 100,
            narrow_viewport_px: 768.0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads overrides from `window.DOCVIEW_CONFIG`, falling back to the
    /// defaults when the global is absent or malformed.
    pub fn from_window() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let raw = js_sys::Reflect::get(&window, &JsValue::from_str("DOCVIEW_CONFIG"))
            .unwrap_or(JsValue::UNDEFINED);
        if raw.is_undefined() || raw.is_null() {
            return Self::default();
        }
        match serde_wasm_bindgen::from_value::<Config>(raw) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring malformed DOCVIEW_CONFIG: {err}");
                Self::default()
            }
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms.into())
    }

    pub fn summary_settle(&self) -> Duration {
        Duration::from_millis(self.summary_settle_ms.into())
    }

    pub fn collapse_delay(&self) -> Duration {
        Duration::from_millis(self.collapse_delay_ms.into())
    }

    pub fn blur_grace(&self) -> Duration {
        Duration::from_millis(self.blur_grace_ms.into())
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
