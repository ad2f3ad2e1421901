//! Markdown chunking strategy (spec §4.2).
//!
//! Parses ATX headings (levels 1-5), flattens to leaf sections (headings
//! with no sub-heading), applies the shared token limiter per leaf, then
//! merges small consecutive chunks globally.

use super::tokens::{approx_tokens, limit_by_lines, merge_small_runs};
use crate::models::{ChunkDraft, ChunkType};

const MAX_TOKENS: usize = 600;
const MIN_TOKENS: usize = 40;
const OVERLAP_TOKENS: usize = 60;
const MERGE_THRESHOLD: usize = 200;

struct Heading<'a> {
    level: usize,
    title: &'a str,
    line_index: usize,
}

fn parse_headings(text: &str) -> Vec<Heading<'_>> {
    let mut headings = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if level == 0 || level > 5 {
            continue;
        }
        // require a space (or end of line) after the hashes to count as ATX
        let rest = &trimmed[level..];
        if !rest.is_empty() && !rest.starts_with(' ') {
            continue;
        }
        headings.push(Heading {
            level,
            title: rest.trim(),
            line_index: i,
        });
    }
    headings
}

fn breadcrumb_for(headings: &[Heading<'_>], index: usize) -> String {
    let target_level = headings[index].level;
    let mut chain = vec![headings[index].title.to_string()];
    let mut level = target_level;
    for h in headings[..index].iter().rev() {
        if h.level < level {
            chain.push(h.title.to_string());
            level = h.level;
        }
        if level == 1 {
            break;
        }
    }
    chain.reverse();
    chain.join(" > ")
}

fn section_end(headings: &[Heading<'_>], index: usize, total_lines: usize) -> usize {
    let level = headings[index].level;
    headings[index + 1..]
        .iter()
        .find(|h| h.level <= level)
        .map(|h| h.line_index)
        .unwrap_or(total_lines)
}

fn is_leaf(headings: &[Heading<'_>], index: usize) -> bool {
    let end = section_end(headings, index, usize::MAX);
    !headings[index + 1..]
        .iter()
        .any(|h| h.line_index < end)
}

fn has_code_fence(text: &str) -> bool {
    text.lines().any(|l| l.trim_start().starts_with("```"))
        || text.lines().any(|l| l.starts_with("    ") && !l.trim().is_empty())
}

fn format_chunk(breadcrumb: &str, body: &str) -> String {
    format!("{breadcrumb}\n\n{}", body.trim())
}

/// Produce markdown chunk drafts for one document's content.
pub fn chunk_markdown(content: String, document_title: &str) -> Vec<ChunkDraft> {
    let lines: Vec<&str> = content.lines().collect();
    let headings = parse_headings(&content);

    let whole_file_tokens = approx_tokens(&content);
    let no_nested_headings = headings.len() <= 1;
    if whole_file_tokens <= MAX_TOKENS && no_nested_headings && has_code_fence(&content) {
        let breadcrumb = document_title.to_string();
        return vec![draft_from(
            format_chunk(&breadcrumb, &content),
            breadcrumb,
            ChunkType::Doc,
            1,
            lines.len() as i64,
        )];
    }

    if headings.is_empty() {
        return chunk_paragraphs(&content, document_title);
    }

    let mut pieces: Vec<(String, String, usize, usize)> = Vec::new(); // (breadcrumb, body, start_line, end_line)
    for i in 0..headings.len() {
        if !is_leaf(&headings, i) {
            continue;
        }
        let end = section_end(&headings, i, lines.len());
        let start = headings[i].line_index + 1;
        if start >= end {
            continue;
        }
        let body = lines[start..end].join("\n");
        if body.trim().is_empty() {
            continue;
        }
        let breadcrumb = breadcrumb_for(&headings, i);

        let body_tokens = approx_tokens(&body);
        if body_tokens > MAX_TOKENS {
            for part in limit_by_lines(&body, MAX_TOKENS, MIN_TOKENS, OVERLAP_TOKENS) {
                pieces.push((breadcrumb.clone(), part, start, end));
            }
        } else {
            pieces.push((breadcrumb, body, start, end));
        }
    }

    merge_leaf_pieces(pieces)
}

/// Merge consecutive leaf pieces while the running piece is under
/// `MERGE_THRESHOLD` tokens and the combined size stays under `MAX_TOKENS`
/// (spec §4.2), keeping each merged group's own line range and breadcrumb
/// (the first piece's breadcrumb wins, matching document order).
fn merge_leaf_pieces(pieces: Vec<(String, String, usize, usize)>) -> Vec<ChunkDraft> {
    let mut drafts: Vec<ChunkDraft> = Vec::new();

    for (breadcrumb, body, start, end) in pieces {
        let formatted = format_chunk(&breadcrumb, &body);
        let piece_tokens = approx_tokens(&formatted);

        if let Some(last) = drafts.last_mut() {
            let last_tokens = last.token_count as usize;
            if last_tokens < MERGE_THRESHOLD && last_tokens + piece_tokens <= MAX_TOKENS {
                last.content.push_str("\n\n");
                last.content.push_str(&body);
                last.token_count = approx_tokens(&last.content) as i64;
                last.line_end = Some(end as i64);
                continue;
            }
        }

        drafts.push(draft_from(
            formatted,
            breadcrumb,
            ChunkType::Doc,
            (start + 1) as i64,
            end as i64,
        ));
    }

    drafts
}

fn chunk_paragraphs(content: &str, document_title: &str) -> Vec<ChunkDraft> {
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    for para in &paragraphs {
        if approx_tokens(para) > MAX_TOKENS {
            pieces.extend(limit_by_lines(para, MAX_TOKENS, MIN_TOKENS, OVERLAP_TOKENS));
        } else {
            pieces.push(para.to_string());
        }
    }
    let merged = merge_small_runs(pieces, MERGE_THRESHOLD, MAX_TOKENS);

    merged
        .into_iter()
        .map(|body| draft_from(format_chunk(document_title, &body), document_title.to_string(), ChunkType::Doc, 1, 1))
        .collect()
}

fn draft_from(
    content: String,
    context_path: String,
    chunk_type: ChunkType,
    line_start: i64,
    line_end: i64,
) -> ChunkDraft {
    let token_count = approx_tokens(&content) as i64;
    ChunkDraft {
        chunk_type,
        language: None,
        symbol_name: None,
        symbol_type: None,
        symbol_id: None,
        symbol_part_index: None,
        symbol_part_count: None,
        line_start: Some(line_start),
        line_end: Some(line_end),
        char_start: None,
        char_end: None,
        token_count,
        content,
        context_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_file_with_code_fence_is_one_chunk() {
        let content = "Some intro text.\n\n```rust\nfn main() {}\n```\n".to_string();
        let drafts = chunk_markdown(content, "Readme");
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].content.starts_with("Readme"));
    }

    #[test]
    fn headings_become_leaf_section_chunks_with_breadcrumbs() {
        let content = "\
# Guide

## Install

Run the installer.

## Usage

### Advanced

Advanced usage details here.
"
        .to_string();
        let drafts = chunk_markdown(content, "Guide");
        assert!(drafts.iter().any(|d| d.context_path == "Guide > Install"));
        assert!(drafts
            .iter()
            .any(|d| d.context_path == "Guide > Usage > Advanced"));
        // "Usage" itself is not a leaf (it has a sub-heading) so it should
        // not appear as its own chunk's breadcrumb.
        assert!(!drafts.iter().any(|d| d.context_path == "Guide > Usage"));
    }

    #[test]
    fn six_hundred_token_markdown_section_stays_one_chunk() {
        // 2400 chars / 4 chars-per-token = exactly 600 tokens (spec §8).
        let body = "a".repeat(2400);
        let content = format!("# Title\n\n{body}\n");
        let drafts = chunk_markdown(content, "Title");
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn no_headings_falls_back_to_paragraphs() {
        let content = "First paragraph.\n\nSecond paragraph with more words in it.".to_string();
        let drafts = chunk_markdown(content, "Notes");
        assert!(!drafts.is_empty());
    }
}
