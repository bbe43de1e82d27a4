use crate::utils::SOURCE_EXTENSIONS;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Read-only access to the source documents the catalogue pages came from
#[derive(Debug, Clone)]
pub struct SourceDocs {
    root: PathBuf,
}

impl SourceDocs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the source document for a catalogue page. `.mdx` is
    /// appended when the page path has no recognized extension.
    pub fn document_path(&self, page: &str) -> PathBuf {
        let file = if SOURCE_EXTENSIONS.iter().any(|ext| page.ends_with(ext)) {
            page.to_string()
        } else {
            format!("{page}.mdx")
        };

        let path = Path::new(&file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// The clickable text of the markdown link `[text](broken_link)` in the
    /// page's source document, if there is one
    pub async fn link_text(&self, page: &str, broken_link: &str) -> Option<String> {
        let path = self.document_path(page);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                ::log::debug!("Cannot read source document {}: {}", path.display(), e);
                return None;
            }
        };

        let text = extract_link_text(&content, broken_link);
        match &text {
            Some(text) => ::log::debug!("Found link text for {}: '{}'", broken_link, text),
            None => ::log::debug!("No link text found for {} in {}", broken_link, path.display()),
        }
        text
    }
}

/// Text of the first markdown link whose target is exactly `link`
pub fn extract_link_text(content: &str, link: &str) -> Option<String> {
    let pattern = format!(r"\[([^\]]+)\]\({}\)", regex::escape(link));
    let regex = Regex::new(&pattern).ok()?;
    regex
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
