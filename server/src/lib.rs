//! docview backend: serves the content directory, searches its Markdown
//! articles and relays AI summaries.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod logger;
pub mod services;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use config::Config;
pub use errors::ServerError;
use services::{ArticleIndex, SummaryService};

/// State shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<ArticleIndex>,
    pub summaries: Arc<SummaryService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let index = ArticleIndex::new(
            config.content_dir.clone(),
            config.manifest_name.clone(),
            config.index_ttl,
        );
        Self {
            index: Arc::new(index),
            summaries: Arc::new(SummaryService::new(Arc::clone(&config))),
            config,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(handlers::handle_search))
        .route("/api/summary", post(handlers::handle_summary))
        .route("/", get(handlers::handle_root))
        .route("/*path", get(handlers::handle_static))
        .with_state(state)
}
