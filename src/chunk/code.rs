//! Code chunking strategy (spec §4.2): walk a Tree-sitter syntax tree,
//! collect symbol nodes (function/method/class/interface/struct/enum),
//! split each into token-bounded parts with line overlap, then merge and
//! prune. Falls back to plain line chunking when no grammar or no symbols
//! are found.

use super::tokens::approx_tokens;
use crate::models::{ChunkDraft, ChunkType};
use tree_sitter::{Language, Node, Parser};

const TARGET_TOKENS: usize = 320;
const OVERLAP_LINES: usize = 8;
const POST_FORMAT_MAX_TOKENS: usize = 1000;
const MERGE_CAP_TOKENS: usize = 800;
const TINY_CHUNK_TOKENS: usize = 50;

const SYMBOL_KIND_MARKERS: &[&str] = &[
    "function",
    "method",
    "class",
    "interface",
    "struct",
    "enum",
];

fn language_for_extension(ext: &str) -> Option<(Language, &'static str)> {
    match ext {
        "rs" => Some((tree_sitter_rust::language(), "rust")),
        "py" => Some((tree_sitter_python::language(), "python")),
        "js" | "jsx" | "mjs" | "cjs" => Some((tree_sitter_javascript::language(), "javascript")),
        "ts" => Some((tree_sitter_typescript::language_typescript(), "typescript")),
        "tsx" => Some((tree_sitter_typescript::language_tsx(), "tsx")),
        "go" => Some((tree_sitter_go::language(), "go")),
        _ => None,
    }
}

struct Symbol<'a> {
    name: String,
    symbol_type: &'static str,
    start_byte: usize,
    end_byte: usize,
    start_line: usize,
    end_line: usize,
    text: &'a str,
}

fn node_name<'a>(node: &Node, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
}

fn matched_kind(kind: &str) -> Option<&'static str> {
    SYMBOL_KIND_MARKERS
        .iter()
        .find(|marker| kind.contains(*marker))
        .copied()
}

fn collect_symbols<'a>(node: Node<'a>, source: &'a str, out: &mut Vec<Symbol<'a>>) {
    if let Some(symbol_type) = matched_kind(node.kind()) {
        let name = node_name(&node, source).unwrap_or("anonymous").to_string();
        out.push(Symbol {
            name,
            symbol_type,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            text: &source[node.start_byte()..node.end_byte()],
        });
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(child, source, out);
    }
}

/// Split `text` into parts of roughly `target_tokens`, each carrying the
/// trailing `overlap_lines` lines of the previous part.
fn split_with_line_overlap(text: &str, target_tokens: usize, overlap_lines: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut start = 0usize;
    while start < lines.len() {
        let mut end = start;
        let mut tokens = 0usize;
        while end < lines.len() {
            let line_tokens = approx_tokens(lines[end]);
            if tokens > 0 && tokens + line_tokens > target_tokens {
                break;
            }
            tokens += line_tokens;
            end += 1;
        }
        if end == start {
            end = start + 1;
        }
        parts.push(lines[start..end].join("\n"));
        if end >= lines.len() {
            break;
        }
        start = end.saturating_sub(overlap_lines).max(start + 1);
    }
    parts
}

fn language_fence_name(lang: &str) -> &str {
    lang
}

fn format_code_chunk(breadcrumb: &str, lang: &str, body: &str) -> String {
    format!("{breadcrumb}\n\n```{}\n{}\n```", language_fence_name(lang), body.trim_end())
}

fn draft(
    chunk_type: ChunkType,
    lang: &str,
    content: String,
    context_path: String,
    symbol_name: Option<String>,
    symbol_type: Option<String>,
    symbol_id: Option<String>,
    part_index: Option<i64>,
    part_count: Option<i64>,
    line_start: i64,
    line_end: i64,
) -> ChunkDraft {
    let token_count = approx_tokens(&content) as i64;
    ChunkDraft {
        chunk_type,
        language: Some(lang.to_string()),
        symbol_name,
        symbol_type,
        symbol_id,
        symbol_part_index: part_index,
        symbol_part_count: part_count,
        line_start: Some(line_start),
        line_end: Some(line_end),
        char_start: None,
        char_end: None,
        token_count,
        content,
        context_path,
    }
}

/// Chunk one source file by language grammar, falling back to line chunking
/// when the extension has no registered grammar or no symbols are found.
pub fn chunk_code(content: String, extension: &str, document_title: &str) -> Vec<ChunkDraft> {
    let Some((language, lang_name)) = language_for_extension(extension) else {
        return line_chunk_fallback(&content, "text", document_title);
    };

    let mut parser = Parser::new();
    if parser.set_language(&language).is_err() {
        return line_chunk_fallback(&content, lang_name, document_title);
    }
    let Some(tree) = parser.parse(&content, None) else {
        return line_chunk_fallback(&content, lang_name, document_title);
    };

    let mut symbols = Vec::new();
    collect_symbols(tree.root_node(), &content, &mut symbols);
    if symbols.is_empty() {
        return line_chunk_fallback(&content, lang_name, document_title);
    }

    let mut drafts = Vec::new();
    for symbol in &symbols {
        let symbol_id = format!("{}:{}-{}", symbol.name, symbol.start_byte, symbol.end_byte);
        let breadcrumb = format!("{document_title} > {}", symbol.name);

        let mut parts = split_with_line_overlap(symbol.text, TARGET_TOKENS, OVERLAP_LINES);
        // re-split anything that still exceeds the post-format ceiling
        let mut reformatted = Vec::new();
        for part in parts.drain(..) {
            let formatted = format_code_chunk(&breadcrumb, lang_name, &part);
            if approx_tokens(&formatted) > POST_FORMAT_MAX_TOKENS {
                reformatted.extend(split_with_line_overlap(&part, TARGET_TOKENS / 2, OVERLAP_LINES));
            } else {
                reformatted.push(part);
            }
        }

        let part_count = reformatted.len();
        for (i, part) in reformatted.into_iter().enumerate() {
            let formatted = format_code_chunk(&breadcrumb, lang_name, &part);
            drafts.push(draft(
                ChunkType::Code,
                lang_name,
                formatted,
                breadcrumb.clone(),
                Some(symbol.name.clone()),
                Some(symbol.symbol_type.to_string()),
                Some(symbol_id.clone()),
                if part_count > 1 { Some(i as i64) } else { None },
                if part_count > 1 { Some(part_count as i64) } else { None },
                symbol.start_line as i64,
                symbol.end_line as i64,
            ));
        }
    }

    let drafts = merge_same_symbol_parts(drafts);
    prune_nested_tiny_duplicates(drafts)
}

/// Merge consecutive parts of the same symbol while their combined size
/// stays at or below `MERGE_CAP_TOKENS` (spec §4.2).
fn merge_same_symbol_parts(drafts: Vec<ChunkDraft>) -> Vec<ChunkDraft> {
    let mut out: Vec<ChunkDraft> = Vec::new();
    for d in drafts {
        if let Some(last) = out.last_mut() {
            let same_symbol = last.symbol_id == d.symbol_id && d.symbol_id.is_some();
            if same_symbol && (last.token_count + d.token_count) as usize <= MERGE_CAP_TOKENS {
                last.content.push_str("\n\n");
                last.content.push_str(&d.content);
                last.token_count += d.token_count;
                last.line_end = d.line_end;
                last.symbol_part_count = None;
                last.symbol_part_index = None;
                continue;
            }
        }
        out.push(d);
    }
    out
}

/// Drop tiny chunks (<50 tokens) whose content is a substring of a larger
/// chunk that contains its line range (spec §4.2).
fn prune_nested_tiny_duplicates(drafts: Vec<ChunkDraft>) -> Vec<ChunkDraft> {
    let keep: Vec<bool> = drafts
        .iter()
        .enumerate()
        .map(|(i, d)| {
            if d.token_count as usize >= TINY_CHUNK_TOKENS {
                return true;
            }
            !drafts.iter().enumerate().any(|(j, other)| {
                i != j
                    && other.token_count > d.token_count
                    && line_range_contains(other, d)
                    && other.content.contains(d.content.trim())
            })
        })
        .collect();

    drafts
        .into_iter()
        .zip(keep)
        .filter_map(|(d, k)| if k { Some(d) } else { None })
        .collect()
}

fn line_range_contains(outer: &ChunkDraft, inner: &ChunkDraft) -> bool {
    match (outer.line_start, outer.line_end, inner.line_start, inner.line_end) {
        (Some(os), Some(oe), Some(is), Some(ie)) => os <= is && ie <= oe,
        _ => false,
    }
}

fn line_chunk_fallback(content: &str, lang: &str, document_title: &str) -> Vec<ChunkDraft> {
    let parts = split_with_line_overlap(content, TARGET_TOKENS, OVERLAP_LINES);
    let total_lines = content.lines().count();
    let mut line_cursor = 1i64;
    parts
        .into_iter()
        .map(|part| {
            let part_lines = part.lines().count().max(1) as i64;
            let line_start = line_cursor;
            let line_end = (line_cursor + part_lines - 1).min(total_lines as i64);
            line_cursor = line_end + 1;
            draft(
                ChunkType::Code,
                lang,
                format_code_chunk(document_title, lang, &part),
                document_title.to_string(),
                None,
                None,
                None,
                None,
                None,
                line_start,
                line_end,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_function_becomes_one_symbol_chunk() {
        let content = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n".to_string();
        let drafts = chunk_code(content, "rs", "lib.rs");
        assert!(drafts.iter().any(|d| d.symbol_name.as_deref() == Some("add")));
    }

    #[test]
    fn long_symbol_splits_into_overlapping_parts() {
        let body_lines: Vec<String> = (0..300)
            .map(|i| format!("    let v{i} = {i};"))
            .collect();
        let content = format!("fn big() {{\n{}\n}}\n", body_lines.join("\n"));
        let drafts = chunk_code(content.clone(), "rs", "lib.rs");
        let parts: Vec<_> = drafts
            .iter()
            .filter(|d| d.symbol_name.as_deref() == Some("big"))
            .collect();
        assert!(parts.len() >= 2, "expected big() to split into >=2 parts");
    }

    #[test]
    fn unsupported_extension_falls_back_to_line_chunking() {
        let content = "line one\nline two\nline three\n".to_string();
        let drafts = chunk_code(content, "zig", "main.zig");
        assert!(!drafts.is_empty());
        assert!(drafts[0].symbol_name.is_none());
    }
}
