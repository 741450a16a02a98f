pub mod article_index;
pub mod search_service;
pub mod summary_service;

pub use article_index::ArticleIndex;
pub use search_service::SearchResult;
pub use summary_service::SummaryService;
