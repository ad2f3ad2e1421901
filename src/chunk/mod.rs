//! The chunking engine (spec §4.2): converts a document's raw content into a
//! sequence of [`ChunkDraft`]s with stable line ranges, breadcrumb context,
//! and approximate token counts.
//!
//! Dispatches by file extension: the markdown family goes through
//! [`markdown::chunk_markdown`]; everything else goes through
//! [`code::chunk_code`], which falls back to line chunking when no grammar
//! is registered or no symbols are found.

pub mod code;
pub mod markdown;
pub mod tokens;

use crate::models::ChunkDraft;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

/// Previews are the first ~220 characters of a chunk's content with
/// whitespace collapsed (spec §4.2).
pub fn preview(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(220).collect()
}

/// A document's title is its first Markdown H1, or `fallback` (typically the
/// filename) when none is present (spec §4.5 step 2: "extracts a title
/// (first H1 or filename)").
pub fn title_from_content(content: &str, fallback: &str) -> String {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("# ").map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Produce chunk drafts for one document, dispatching on its file extension.
pub fn chunk_document(content: String, path: &str, document_title: &str) -> Vec<ChunkDraft> {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if MARKDOWN_EXTENSIONS.contains(&extension.as_str()) {
        markdown::chunk_markdown(content, document_title)
    } else {
        code::chunk_code(content, &extension, document_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_collapses_whitespace_and_truncates() {
        let content = format!("line one\n\n\n{}", "word ".repeat(100));
        let p = preview(&content);
        assert!(p.len() <= 220);
        assert!(!p.contains('\n'));
    }

    #[test]
    fn dispatches_markdown_extension_to_markdown_strategy() {
        let drafts = chunk_document("# Title\n\nbody text here".to_string(), "README.md", "README");
        assert!(!drafts.is_empty());
        assert!(drafts[0].language.is_none());
    }

    #[test]
    fn title_from_content_prefers_first_h1_over_fallback() {
        assert_eq!(title_from_content("body only", "https://x/y"), "https://x/y");
        assert_eq!(title_from_content("# My Title\n\nbody", "fallback"), "My Title");
    }

    #[test]
    fn dispatches_other_extensions_to_code_strategy() {
        let drafts = chunk_document("fn main() {}\n".to_string(), "main.rs", "main.rs");
        assert!(!drafts.is_empty());
        assert_eq!(drafts[0].language.as_deref(), Some("rust"));
    }
}
