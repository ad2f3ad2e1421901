//! Document retrieval by id, path, or uri, with an optional line-slice
//! (spec §6 `get --library L [--doc ID | PATH|URI] [--slice a:b]`, §8
//! scenario 5).

use crate::store::library::{self, DocumentRecord};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;

/// `a:b`, one-indexed, inclusive on both ends. A span (`b - a + 1`) of 400
/// lines or more is rejected (spec §8 scenario 5: "`--slice 1:500` errors
/// when `span ≥ 400`").
const MAX_SLICE_SPAN: usize = 400;

#[derive(Debug, Clone, Copy)]
pub struct Slice {
    pub start: usize,
    pub end: usize,
}

impl std::str::FromStr for Slice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (a, b) = s
            .split_once(':')
            .with_context(|| format!("invalid slice {s:?}: expected \"a:b\""))?;
        let start: usize = a.trim().parse().with_context(|| format!("invalid slice start: {a:?}"))?;
        let end: usize = b.trim().parse().with_context(|| format!("invalid slice end: {b:?}"))?;
        if start == 0 || end == 0 {
            bail!("slice bounds are one-indexed and must be >= 1");
        }
        if start > end {
            bail!("slice start ({start}) must be <= end ({end})");
        }
        let span = end - start + 1;
        if span >= MAX_SLICE_SPAN {
            bail!("slice span ({span} lines) must be < {MAX_SLICE_SPAN}");
        }
        Ok(Slice { start, end })
    }
}

impl Slice {
    /// Apply the slice to `content`, returning the selected lines joined by
    /// `\n` with no trailing terminator.
    pub fn apply(&self, content: &str) -> String {
        content
            .lines()
            .skip(self.start - 1)
            .take(self.end - self.start + 1)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub position: i64,
    pub chunk_type: String,
    pub context_path: String,
    pub token_count: i64,
    pub slice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub path: String,
    pub version_label: String,
    pub uri: String,
    pub title: String,
    pub content_type: String,
    pub active: bool,
    pub body: String,
    pub chunks: Vec<ChunkSummary>,
}

/// Locate a document within one library by explicit id, else by path, else
/// by uri, in that order (spec §6 `get --doc ID | PATH|URI`).
async fn resolve_document(
    pool: &SqlitePool,
    doc_id: Option<&str>,
    path_or_uri: Option<&str>,
    version_label: Option<&str>,
) -> Result<DocumentRecord> {
    if let Some(id) = doc_id {
        return library::get_document(pool, id)
            .await?
            .with_context(|| format!("document not found: {id}"));
    }

    let locator = path_or_uri.context("get requires --doc ID or a PATH|URI argument")?;
    let id = if locator.contains("://") {
        library::find_document_by_uri(pool, locator).await?
    } else {
        library::find_document_by_path(pool, locator, version_label).await?
    };
    let id = id.with_context(|| format!("document not found: {locator}"))?;
    library::get_document(pool, &id)
        .await?
        .with_context(|| format!("document not found: {id}"))
}

/// Core get function returning structured data (used by both the CLI and
/// `--json` output).
pub async fn get_document(
    pool: &SqlitePool,
    doc_id: Option<&str>,
    path_or_uri: Option<&str>,
    version_label: Option<&str>,
    slice: Option<Slice>,
) -> Result<DocumentResponse> {
    let record = resolve_document(pool, doc_id, path_or_uri, version_label).await?;

    let body = match slice {
        Some(s) => s.apply(&record.content),
        None => record.content.clone(),
    };

    let chunks = library::list_chunks_for_document(pool, &record.id)
        .await?
        .into_iter()
        .map(|c| ChunkSummary {
            position: c.position,
            chunk_type: c.chunk_type.as_str().to_string(),
            context_path: c.context_path,
            token_count: c.token_count,
            slice: match (c.line_start, c.line_end) {
                (Some(a), Some(b)) => format!("{a}:{b}"),
                _ => String::new(),
            },
        })
        .collect();

    Ok(DocumentResponse {
        id: record.id,
        path: record.path,
        version_label: record.version_label,
        uri: record.uri,
        title: record.title,
        content_type: record.content_type,
        active: record.active,
        body,
        chunks,
    })
}

/// CLI entry point — prints a human-readable rendering, or JSON when
/// `json` is set.
pub fn print_document(doc: &DocumentResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    println!("path:         {}", doc.path);
    println!("uri:          {}", doc.uri);
    println!("version:      {}", doc.version_label);
    println!("content_type: {}", doc.content_type);
    println!("active:       {}", doc.active);
    println!();
    println!("--- Body ---");
    println!("{}", doc.body);
    println!();
    println!("--- Chunks ({}) ---", doc.chunks.len());
    for chunk in &doc.chunks {
        println!(
            "[{:>3}] {:<10} {:<30} tokens={:<5} lines={}",
            chunk.position, chunk.chunk_type, chunk.context_path, chunk.token_count, chunk.slice
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_parses_one_indexed_inclusive_range() {
        let slice: Slice = "2:3".parse().unwrap();
        assert_eq!(slice.apply("line1\nline2\nline3\nline4"), "line2\nline3");
    }

    #[test]
    fn slice_rejects_inverted_range() {
        assert!("3:2".parse::<Slice>().is_err());
    }

    #[test]
    fn slice_rejects_span_at_or_above_max() {
        assert!("1:500".parse::<Slice>().is_err());
        assert!("1:400".parse::<Slice>().is_err());
        assert!("1:399".parse::<Slice>().is_ok());
    }
}
