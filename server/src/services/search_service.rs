use std::fs;
use std::sync::{Arc, OnceLock};

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;
use crate::services::ArticleIndex;

const CONTEXT_CHARS: usize = 50;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub file: String,
    pub title: String,
    pub context: String,
}

/// Case-insensitive substring search over every indexed article.
pub fn search(index: &ArticleIndex, query: &str) -> Result<Vec<SearchResult>, ServerError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let articles = index.articles()?;
    let mut results = Vec::new();
    for file in articles.iter() {
        let content = match fs::read_to_string(index.root().join(file)) {
            Ok(content) => Some(content),
            Err(err) => {
                warn!("could not read {file}: {err}");
                None
            }
        };
        if let Some(result) = match_article(file, content.as_deref(), query) {
            results.push(result);
        }
    }
    info!("search {query:?}: {} of {} articles match", results.len(), articles.len());
    Ok(results)
}

/// `search` on the blocking pool, so directory walks and file reads stay
/// off the async workers.
pub async fn search_blocking(
    index: Arc<ArticleIndex>,
    query: String,
) -> Result<Vec<SearchResult>, ServerError> {
    tokio::task::spawn_blocking(move || search(&index, &query))
        .await
        .map_err(|err| ServerError::Io(std::io::Error::other(err)))?
}

/// Lowercase one char, treating final sigma as sigma.
fn fold_char(ch: char) -> impl Iterator<Item = char> {
    ch.to_lowercase().map(|c| if c == 'ς' { 'σ' } else { c })
}

/// Caseless form used on both sides of every comparison.
fn fold_case(text: &str) -> String {
    text.chars().flat_map(fold_char).collect()
}

/// Match one article against the query. `content` is `None` when the file
/// could not be read, in which case only its name can match.
pub fn match_article(file: &str, content: Option<&str>, query: &str) -> Option<SearchResult> {
    let query_lower = fold_case(query);
    let file_name = file.rsplit('/').next().unwrap_or(file);
    let name_match = fold_case(file_name).contains(&query_lower);

    let Some(content) = content else {
        return name_match.then(|| SearchResult {
            file: file.to_string(),
            title: file_name.to_string(),
            context: format!("File name contains the query: {file_name} (content unreadable)"),
        });
    };

    let title = extract_title(content).unwrap_or_else(|| file_name.to_string());
    let context = if let Some(context) = match_context(content, &query_lower) {
        context
    } else if fold_case(&title).contains(&query_lower) {
        format!("Title contains the query: {title}")
    } else if name_match {
        format!("File name contains the query: {file_name}")
    } else {
        return None;
    };
    debug!("match in {file}");
    Some(SearchResult {
        file: file.to_string(),
        title,
        context,
    })
}

/// Text of the first level-one heading.
pub fn extract_title(content: &str) -> Option<String> {
    static RE_TITLE: OnceLock<Regex> = OnceLock::new();
    let re = RE_TITLE.get_or_init(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").unwrap());
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('\r').to_string())
}

/// Up to 50 characters either side of the first case-insensitive match,
/// with `...` marking each side that was cut. `query_lower` must already be
/// case folded.
pub fn match_context(content: &str, query_lower: &str) -> Option<String> {
    if query_lower.is_empty() {
        return None;
    }
    // Lowercasing can change lengths, so keep a map from each lowered char
    // back to the char it came from.
    let original: Vec<char> = content.chars().collect();
    let mut lowered = String::with_capacity(content.len());
    let mut origin = Vec::with_capacity(original.len());
    for (idx, ch) in original.iter().enumerate() {
        for lower in fold_char(*ch) {
            lowered.push(lower);
            origin.push(idx);
        }
    }

    let byte_pos = lowered.find(query_lower)?;
    let first = lowered[..byte_pos].chars().count();
    let last = first + query_lower.chars().count() - 1;
    let match_start = origin[first];
    let match_end = origin[last] + 1;

    let start = match_start.saturating_sub(CONTEXT_CHARS);
    let end = (match_end + CONTEXT_CHARS).min(original.len());
    let mut context = String::new();
    if start > 0 {
        context.push_str("...");
    }
    context.extend(&original[start..end]);
    if end < original.len() {
        context.push_str("...");
    }
    Some(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn content_match_carries_context_window() {
        let body = format!("# Setup\n{}needle{}", "a".repeat(60), "b".repeat(60));
        let result = match_article("guide/setup.md", Some(&body), "NEEDLE").unwrap();
        assert_eq!(result.title, "Setup");
        assert_eq!(result.file, "guide/setup.md");
        assert_eq!(
            result.context,
            format!("...{}needle{}...", "a".repeat(50), "b".repeat(50))
        );
    }

    #[test]
    fn short_documents_are_not_marked_as_cut() {
        let result = match_article("a.md", Some("find the Word here"), "word").unwrap();
        assert_eq!(result.context, "find the Word here");
    }

    #[test]
    fn name_only_match_falls_back_to_name_context() {
        let result = match_article("docs/rust-intro.md", Some("# Welcome\nnothing else"), "rust").unwrap();
        assert_eq!(result.title, "Welcome");
        assert_eq!(result.context, "File name contains the query: rust-intro.md");
        assert_eq!(match_article("docs/intro.md", Some("# Welcome"), "rust"), None);
    }

    #[test]
    fn unreadable_files_match_on_name_only() {
        let result = match_article("broken.md", None, "broken").unwrap();
        assert_eq!(result.title, "broken.md");
        assert_eq!(match_article("broken.md", None, "other"), None);
    }

    #[test]
    fn context_indices_survive_case_folding() {
        // 'İ' lowercases to two chars; the window must still line up.
        let body = "İİİ target";
        assert_eq!(match_context(body, "target").as_deref(), Some("İİİ target"));
        assert_eq!(extract_title("intro\n#   Title  \nbody").as_deref(), Some("Title"));
        assert_eq!(extract_title("#NoSpace"), None);
    }

    #[test]
    fn greek_final_sigma_matches_content() {
        let body = "# Roads\nThe word ΟΔΟΣ appears here";
        let upper = match_article("roads.md", Some(body), "ΟΔΟΣ").unwrap();
        assert_eq!(upper.context, body);
        let lower = match_article("roads.md", Some(body), "οδος").unwrap();
        assert_eq!(lower.context, body);
    }

    #[tokio::test]
    async fn blocking_search_finds_nested_articles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guide")).unwrap();
        std::fs::write(dir.path().join("guide/borrow.md"), "# Borrowing\nShared refs").unwrap();
        let index = Arc::new(ArticleIndex::new(
            dir.path().to_path_buf(),
            "content.md".to_string(),
            Duration::from_secs(60),
        ));

        let results = search_blocking(Arc::clone(&index), "shared".to_string())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, "guide/borrow.md");
        assert!(search_blocking(index, " ".to_string()).await.unwrap().is_empty());
    }

    #[test]
    fn search_walks_the_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("content.md"), "[Docs]\n[Rust][rust.md]").unwrap();
        std::fs::write(dir.path().join("rust.md"), "# Rust\nOwnership rules").unwrap();
        std::fs::write(dir.path().join("go.md"), "# Go\nGoroutines").unwrap();
        let index = ArticleIndex::new(
            dir.path().to_path_buf(),
            "content.md".to_string(),
            Duration::from_secs(60),
        );

        let results = search(&index, "  ownership ").unwrap();
        assert_eq!(
            results,
            vec![SearchResult {
                file: "rust.md".to_string(),
                title: "Rust".to_string(),
                context: "# Rust\nOwnership rules".to_string(),
            }]
        );
        assert!(search(&index, "   ").unwrap().is_empty());
        // The manifest mentions "Docs" but is never a result.
        assert!(search(&index, "docs").unwrap().is_empty());
    }
}
