use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::render::escape_html;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub file: String,
    pub title: String,
    pub context: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SearchView {
    #[default]
    Idle,
    Loading,
    /// Results for `query`, in server order.
    Results {
        query: String,
        results: Vec<SearchResult>,
    },
    Failed(String),
}

impl SearchView {
    pub fn has_results(&self) -> bool {
        matches!(self, SearchView::Results { results, .. } if !results.is_empty())
    }
}

pub fn search_url(endpoint: &str, query: &str) -> String {
    format!("{endpoint}?query={}", urlencoding::encode(query))
}

/// HTML for `text` with every case-insensitive literal occurrence of
/// `query` wrapped in a highlight span. Everything else is escaped.
pub fn highlight(text: &str, query: &str) -> String {
    if query.is_empty() {
        return escape_html(text);
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    else {
        return escape_html(text);
    };

    let mut out = String::with_capacity(text.len() + 32);
    let mut last = 0;
    for found in re.find_iter(text) {
        out.push_str(&escape_html(&text[last..found.start()]));
        out.push_str("<span class=\"search-highlight\">");
        out.push_str(&escape_html(found.as_str()));
        out.push_str("</span>");
        last = found.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}
