use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ServerError;
use crate::services::{search_service, SearchResult};
use crate::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ServerError> {
    log::debug!("search request {:?}", params.query);
    search_service::search_blocking(Arc::clone(&state.index), params.query)
        .await
        .map(Json)
}

#[derive(Deserialize, Debug, Default)]
pub struct SummaryRequest {
    #[serde(default)]
    pub content: Option<String>,
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| {
            accept.contains("application/json") && !accept.contains("text/event-stream")
        })
}

pub async fn handle_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SummaryRequest>,
) -> Result<Response, ServerError> {
    let content = request
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("content must not be empty".to_string()))?;

    if wants_json(&headers) {
        let summary = state.summaries.summarize(&content).await?;
        return Ok(Json(json!({ "summary": summary })).into_response());
    }

    let frames = state.summaries.clone().stream(content);
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// Map a request path onto the content directory. Only plain components
/// are allowed.
pub fn resolve_static_path(root: &Path, requested: &str) -> Result<PathBuf, ServerError> {
    let relative = requested.trim_start_matches('/');
    let relative = if relative.is_empty() { "index.html" } else { relative };
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ServerError::InvalidPath);
    }
    Ok(root.join(relative))
}

pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "wasm" => "application/wasm",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn serve_file(state: &AppState, requested: &str) -> Result<Response, ServerError> {
    let path = resolve_static_path(&state.config.content_dir, requested)?;
    if !path.is_file() {
        log::debug!("no file at {path:?}");
        return Err(ServerError::NotFound);
    }
    let bytes = tokio::fs::read(&path).await?;
    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&path)),
    );
    Ok(response)
}

pub async fn handle_root(State(state): State<AppState>) -> Result<Response, ServerError> {
    serve_file(&state, "").await
}

pub async fn handle_static(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
) -> Result<Response, ServerError> {
    serve_file(&state, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::summary_service::content_key;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;

    fn state_for(dir: &Path) -> AppState {
        AppState::new(Config {
            content_dir: dir.to_path_buf(),
            upstream_url: "http://127.0.0.1:9/unreachable".to_string(),
            ..Config::new()
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/srv/docs");
        assert_eq!(
            resolve_static_path(root, "/").unwrap(),
            PathBuf::from("/srv/docs/index.html")
        );
        assert_eq!(
            resolve_static_path(root, "guide/setup.md").unwrap(),
            PathBuf::from("/srv/docs/guide/setup.md")
        );
        assert!(matches!(
            resolve_static_path(root, "../etc/passwd"),
            Err(ServerError::InvalidPath)
        ));
        assert!(matches!(
            resolve_static_path(root, "guide/./../../x"),
            Err(ServerError::InvalidPath)
        ));
    }

    #[test]
    fn accept_header_selects_json() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(wants_json(&headers));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream, application/json"),
        );
        assert!(!wants_json(&headers));
    }

    #[tokio::test]
    async fn empty_summary_content_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let result = handle_summary(
            State(state_for(dir.path())),
            HeaderMap::new(),
            Json(SummaryRequest {
                content: Some("   ".to_string()),
            }),
        )
        .await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "content must not be empty" })
        );
    }

    #[tokio::test]
    async fn cached_summary_answers_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());
        state
            .summaries
            .cache()
            .insert(content_key("long article"), "Cached.".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let response = handle_summary(
            State(state),
            headers,
            Json(SummaryRequest {
                content: Some("long article".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body_json(response).await, json!({ "summary": "Cached." }));
    }

    #[tokio::test]
    async fn search_handler_returns_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("intro.md"), "# Intro\nhello world").unwrap();
        let Json(results) = handle_search(
            State(state_for(dir.path())),
            Query(SearchParams {
                query: "WORLD".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Intro");
    }

    #[tokio::test]
    async fn static_files_get_a_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let response = handle_root(State(state_for(dir.path()))).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );

        let missing = handle_static(
            State(state_for(dir.path())),
            AxumPath("nope.md".to_string()),
        )
        .await;
        assert!(matches!(missing, Err(ServerError::NotFound)));
    }
}
