use regex::Regex;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub title: Option<String>,
    pub entries: Vec<NavEntry>,
}

impl Manifest {
    /// Parse the line-oriented manifest: `[title]` on the first line, then
    /// `[label][path]` per entry. Lines that do not match are ignored.
    pub fn parse(text: &str) -> Self {
        static RE_TITLE: OnceLock<Regex> = OnceLock::new();
        static RE_ENTRY: OnceLock<Regex> = OnceLock::new();

        let re_title = RE_TITLE.get_or_init(|| Regex::new(r"\[(.*?)\]").unwrap());
        let re_entry = RE_ENTRY.get_or_init(|| Regex::new(r"\[(.*?)\]\[(.*?)\]").unwrap());

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let mut lines = trimmed.lines();
        let title = lines
            .next()
            .and_then(|first| re_title.captures(first))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|title| !title.is_empty());

        let entries = lines
            .filter_map(|line| re_entry.captures(line))
            .filter_map(|cap| {
                let label = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
                let path = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
                if path.is_empty() {
                    return None;
                }
                let label = if label.is_empty() {
                    label_from_path(path)
                } else {
                    label.to_string()
                };
                Some(NavEntry {
                    label,
                    path: path.to_string(),
                })
            })
            .collect();

        Self { title, entries }
    }
}

/// `guide/intro.md` -> `Intro`
fn label_from_path(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_entries() {
        let manifest = Manifest::parse("[Site]\n[Label][a/b.md]\n[][c.md]");
        assert_eq!(manifest.title.as_deref(), Some("Site"));
        assert_eq!(
            manifest.entries,
            vec![
                NavEntry {
                    label: "Label".to_string(),
                    path: "a/b.md".to_string()
                },
                NavEntry {
                    label: "C".to_string(),
                    path: "c.md".to_string()
                },
            ]
        );
    }

    #[test]
    fn drops_entries_without_path() {
        let manifest = Manifest::parse("[Docs]\n[Orphan][]\nnot an entry\n[Ok][ok.md]\n");
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].label, "Ok");
    }

    #[test]
    fn empty_manifest_has_nothing() {
        assert_eq!(Manifest::parse("  \n "), Manifest::default());
    }

    #[test]
    fn label_uses_stem_before_first_dot() {
        assert_eq!(label_from_path("notes/release.v2.md"), "Release");
        assert_eq!(label_from_path("émigré.md"), "Émigré");
    }
}
