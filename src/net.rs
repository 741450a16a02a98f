use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, AbortSignal, Headers, ReadableStreamDefaultReader, RequestInit, Response};

use crate::error::FetchError;

pub fn abort_controller() -> Result<AbortController, FetchError> {
    AbortController::new().map_err(FetchError::from_js)
}

async fn send(url: &str, init: &RequestInit) -> Result<Response, FetchError> {
    let window = web_sys::window().ok_or(FetchError::NoWindow)?;
    let value = JsFuture::from(window.fetch_with_str_and_init(url, init))
        .await
        .map_err(FetchError::from_js)?;
    let response: Response = value.dyn_into().map_err(FetchError::from_js)?;
    if !response.ok() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    Ok(response)
}

fn get_init(signal: Option<&AbortSignal>) -> RequestInit {
    let init = RequestInit::new();
    init.set_method("GET");
    init.set_signal(signal);
    init
}

async fn response_text(response: Response) -> Result<String, FetchError> {
    let promise = response.text().map_err(FetchError::from_js)?;
    let value = JsFuture::from(promise).await.map_err(FetchError::from_js)?;
    value
        .as_string()
        .ok_or_else(|| FetchError::Decode("response body is not text".to_string()))
}

pub async fn get_text(url: &str, signal: Option<&AbortSignal>) -> Result<String, FetchError> {
    let response = send(url, &get_init(signal)).await?;
    response_text(response).await
}

pub async fn get_json<T: DeserializeOwned>(url: &str, signal: Option<&AbortSignal>) -> Result<T, FetchError> {
    let text = get_text(url, signal).await?;
    Ok(serde_json::from_str(&text)?)
}

/// POST `body` as JSON. The caller picks how to consume the response.
pub async fn post_json<B: Serialize>(
    url: &str,
    body: &B,
    accept: &str,
    signal: Option<&AbortSignal>,
) -> Result<Response, FetchError> {
    let payload = serde_json::to_string(body)?;
    let headers = Headers::new().map_err(FetchError::from_js)?;
    headers
        .set("Content-Type", "application/json")
        .map_err(FetchError::from_js)?;
    headers.set("Accept", accept).map_err(FetchError::from_js)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(&payload));
    init.set_signal(signal);
    send(url, &init).await
}

pub async fn json_body<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let text = response_text(response).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Incremental reader over a response body.
pub struct BodyReader {
    reader: ReadableStreamDefaultReader,
}

impl BodyReader {
    pub fn new(response: &Response) -> Result<Self, FetchError> {
        let body = response
            .body()
            .ok_or_else(|| FetchError::Decode("response has no body".to_string()))?;
        let reader = body.get_reader().unchecked_into::<ReadableStreamDefaultReader>();
        Ok(Self { reader })
    }

    /// Next chunk of bytes, or `None` once the stream is exhausted.
    pub async fn next_chunk(&self) -> Result<Option<Vec<u8>>, FetchError> {
        let result = JsFuture::from(self.reader.read())
            .await
            .map_err(FetchError::from_js)?;
        let done = js_sys::Reflect::get(&result, &JsValue::from_str("done"))
            .ok()
            .and_then(|done| done.as_bool())
            .unwrap_or(true);
        if done {
            return Ok(None);
        }
        let value = js_sys::Reflect::get(&result, &JsValue::from_str("value"))
            .map_err(FetchError::from_js)?;
        Ok(Some(js_sys::Uint8Array::new(&value).to_vec()))
    }
}
