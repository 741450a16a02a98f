use crate::config::Config;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// Fragment as it appeared in the location bar, used for active-link matching.
    pub fragment: String,
    /// Server path of the Markdown document, always with a leading `/`.
    pub document_path: String,
}

impl Route {
    pub fn resolve(fragment: &str, config: &Config) -> Self {
        let path = fragment.trim_start_matches('#').trim_start_matches('/');
        if path.is_empty() || path == config.home_route {
            return Self {
                fragment: fragment.to_string(),
                document_path: config.home_document.clone(),
            };
        }

        let mut document_path = String::with_capacity(path.len() + 4);
        document_path.push('/');
        document_path.push_str(path);
        if !path.contains('.') {
            document_path.push('.');
            document_path.push_str(&config.default_extension);
        }

        Self {
            fragment: fragment.to_string(),
            document_path,
        }
    }
}

/// `#/` link for a manifest or search path, dropping a trailing `.md`.
pub fn href_for(path: &str) -> String {
    format!("#/{}", strip_doc_extension(path.trim_start_matches('/')))
}

pub fn strip_doc_extension(path: &str) -> &str {
    let len = path.len();
    if len >= 3 && path.is_char_boundary(len - 3) && path[len - 3..].eq_ignore_ascii_case(".md") {
        &path[..len - 3]
    } else {
        path
    }
}

pub fn is_active(link_href: &str, current_fragment: &str) -> bool {
    link_href == current_fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(fragment: &str) -> String {
        Route::resolve(fragment, &Config::default()).document_path
    }

    #[test]
    fn appends_extension_and_leading_slash() {
        assert_eq!(resolve("#/a/b"), "/a/b.md");
        assert_eq!(resolve("#/notes/readme.txt"), "/notes/readme.txt");
    }

    #[test]
    fn home_routes_resolve_to_home_document() {
        assert_eq!(resolve(""), "/home.md");
        assert_eq!(resolve("#"), "/home.md");
        assert_eq!(resolve("#/"), "/home.md");
        assert_eq!(resolve("#/home"), "/home.md");
    }

    #[test]
    fn hrefs_drop_markdown_suffix() {
        assert_eq!(href_for("a/b.md"), "#/a/b");
        assert_eq!(href_for("Guide.MD"), "#/Guide");
        assert_eq!(href_for("image.png"), "#/image.png");
        assert!(is_active("#/a/b", "#/a/b"));
        assert!(!is_active("#/a/b", "#/a/b/"));
    }
}
