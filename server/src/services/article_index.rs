use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::errors::ServerError;

/// Cached list of searchable articles under the content directory.
pub struct ArticleIndex {
    root: PathBuf,
    manifest_name: String,
    ttl: Duration,
    cached: Mutex<Option<(Instant, Arc<Vec<String>>)>>,
}

impl ArticleIndex {
    pub fn new(root: PathBuf, manifest_name: String, ttl: Duration) -> Self {
        Self {
            root,
            manifest_name,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative `/`-separated paths of every Markdown file except the
    /// manifest, sorted. Rescans once the cached list is older than the TTL.
    pub fn articles(&self) -> Result<Arc<Vec<String>>, ServerError> {
        if let Ok(cached) = self.cached.lock() {
            if let Some((at, articles)) = cached.as_ref() {
                if at.elapsed() < self.ttl {
                    return Ok(Arc::clone(articles));
                }
            }
        }

        let articles = Arc::new(self.scan()?);
        log::info!("indexed {} articles under {:?}", articles.len(), self.root);
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((Instant::now(), Arc::clone(&articles)));
        }
        Ok(articles)
    }

    fn scan(&self) -> Result<Vec<String>, ServerError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        collect_markdown_files(&self.root, &self.root, &mut entries)?;
        entries.retain(|path| *path != self.manifest_name);
        entries.sort();
        Ok(entries)
    }
}

fn collect_markdown_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), ServerError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_markdown_files(root, &path, out)?;
            continue;
        }
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|_| ServerError::InvalidPath)?
            .to_string_lossy()
            .replace('\\', "/");
        out.push(rel);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn lists_nested_markdown_without_manifest_or_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "content.md", "[Docs]");
        write(dir.path(), "home.md", "# Home");
        write(dir.path(), "guide/setup.MD", "# Setup");
        write(dir.path(), ".drafts/secret.md", "# Hidden");
        write(dir.path(), "notes.txt", "not markdown");

        let index = ArticleIndex::new(
            dir.path().to_path_buf(),
            "content.md".to_string(),
            Duration::from_secs(60),
        );
        assert_eq!(
            *index.articles().unwrap(),
            vec!["guide/setup.MD".to_string(), "home.md".to_string()]
        );
    }

    #[test]
    fn cached_list_is_reused_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "a");
        let index = ArticleIndex::new(
            dir.path().to_path_buf(),
            "content.md".to_string(),
            Duration::from_secs(60),
        );
        assert_eq!(index.articles().unwrap().len(), 1);

        write(dir.path(), "b.md", "b");
        assert_eq!(index.articles().unwrap().len(), 1);

        let fresh = ArticleIndex::new(
            dir.path().to_path_buf(),
            "content.md".to_string(),
            Duration::ZERO,
        );
        assert_eq!(fresh.articles().unwrap().len(), 2);
    }

    #[test]
    fn missing_root_is_empty() {
        let index = ArticleIndex::new(
            PathBuf::from("/nonexistent/docview"),
            "content.md".to_string(),
            Duration::from_secs(60),
        );
        assert!(index.articles().unwrap().is_empty());
    }
}
