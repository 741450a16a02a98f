use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Superseded by a newer request of the same class. Never shown.
    #[error("request aborted")]
    Aborted,
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("no browser window available")]
    NoWindow,
}

impl FetchError {
    /// Classify a rejected fetch promise. `AbortError` means our own
    /// controller fired.
    pub fn from_js(value: JsValue) -> Self {
        let name = js_sys::Reflect::get(&value, &JsValue::from_str("name"))
            .ok()
            .and_then(|name| name.as_string());
        if name.as_deref() == Some("AbortError") {
            return FetchError::Aborted;
        }
        let message = value
            .dyn_ref::<js_sys::Error>()
            .map(|err| String::from(err.message()))
            .or_else(|| value.as_string())
            .unwrap_or_else(|| format!("{value:?}"));
        FetchError::Network(message)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
