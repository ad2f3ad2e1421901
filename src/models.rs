//! Core data types shared across the store, chunker, sync engines, and search.
//!
//! Sources live in the index DB; everything else (documents, chunks, vectors,
//! crawl queue) lives in a per-source library DB.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of source a library was registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Web,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::Web => "web",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(SourceKind::Github),
            "web" => Ok(SourceKind::Web),
            other => Err(anyhow::anyhow!("unknown source kind: {other}")),
        }
    }
}

/// GitHub ingest mode: `docs` keeps only files under `docs_path` that contain
/// a fenced code block; `repo` keeps everything the path filter allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Docs,
    Repo,
}

impl std::str::FromStr for IngestMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docs" => Ok(IngestMode::Docs),
            "repo" => Ok(IngestMode::Repo),
            other => Err(anyhow::anyhow!("unknown ingest mode: {other}")),
        }
    }
}

/// A library registration (index DB row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub name: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub library_db_path: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_commit: Option<String>,
    pub last_etag: Option<String>,
    pub last_error: Option<String>,

    // github-specific
    pub git_ref: Option<String>,
    pub docs_path: Option<String>,
    pub ingest_mode: Option<IngestMode>,
    pub version_label: Option<String>,

    // web-specific
    pub root_url: Option<String>,
    pub allowed_paths: Vec<String>,
    pub denied_paths: Vec<String>,
    pub max_depth: Option<i64>,
    pub max_pages: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-`(source, version_label)` sync outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVersion {
    pub source_id: String,
    pub version_label: String,
    pub git_ref: Option<String>,
    pub commit_sha: Option<String>,
    pub tree_hash: Option<String>,
    pub etag: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// Canonical content store keyed by SHA-256 hex of `content` (library DB).
#[derive(Debug, Clone)]
pub struct DocumentBlob {
    pub hash: String,
    pub content: String,
}

/// One logical document per `(source_id, path, version_label)` (library DB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub version_label: String,
    pub uri: String,
    pub title: String,
    pub hash: String,
    pub content_type: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of chunk content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkType {
    Code,
    Doc,
    DocInline,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Code => "code",
            ChunkType::Doc => "doc",
            ChunkType::DocInline => "doc-inline",
        }
    }
}

impl std::str::FromStr for ChunkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ChunkType::Code),
            "doc" => Ok(ChunkType::Doc),
            "doc-inline" => Ok(ChunkType::DocInline),
            other => Err(anyhow::anyhow!("unknown chunk type: {other}")),
        }
    }
}

/// A retrievable unit of content belonging to one [`Document`] (library DB).
///
/// `id` is the table's native rowid: the FTS index is an external-content
/// table keyed on this same rowid (spec §8 invariant 1), so it must stay an
/// integer rather than the UUID-text ids used elsewhere in the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: String,
    pub position: i64,
    pub chunk_type: ChunkType,
    pub language: Option<String>,
    pub symbol_name: Option<String>,
    pub symbol_type: Option<String>,
    pub symbol_id: Option<String>,
    pub symbol_part_index: Option<i64>,
    pub symbol_part_count: Option<i64>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub char_start: Option<i64>,
    pub char_end: Option<i64>,
    pub token_count: i64,
    pub chunk_sha: String,
    pub content: String,

    // denormalized for cheap search-result formatting
    pub doc_path: String,
    pub doc_uri: String,
    pub doc_title: String,
    pub context_path: String,
}

/// A floating-point vector attached to a chunk for a given embedding model.
#[derive(Debug, Clone)]
pub struct ChunkVector {
    pub chunk_id: i64,
    pub document_id: String,
    pub model_uri: String,
    pub dims: i64,
}

/// Raw vector bytes (little-endian f32) for one `(chunk_id, model_uri)` pair.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub chunk_id: i64,
    pub embedding: Vec<u8>,
}

/// Crawl queue status transitions: `pending -> fetching -> (done|failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlPageStatus {
    Pending,
    Fetching,
    Done,
    Failed,
}

impl CrawlPageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlPageStatus::Pending => "pending",
            CrawlPageStatus::Fetching => "fetching",
            CrawlPageStatus::Done => "done",
            CrawlPageStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CrawlPageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrawlPageStatus::Pending),
            "fetching" => Ok(CrawlPageStatus::Fetching),
            "done" => Ok(CrawlPageStatus::Done),
            "failed" => Ok(CrawlPageStatus::Failed),
            other => Err(anyhow::anyhow!("unknown crawl page status: {other}")),
        }
    }
}

/// One row per normalized URL discovered for a web source, unique by
/// `(source_id, normalized_url)`.
#[derive(Debug, Clone)]
pub struct CrawlPage {
    pub id: i64,
    pub source_id: String,
    pub url: String,
    pub normalized_url: String,
    pub depth: i64,
    pub status: CrawlPageStatus,
    pub last_error: Option<String>,
}

/// Output of the chunker, before it is assigned a stable id/position and
/// written to the store. See [`crate::chunk`].
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub chunk_type: ChunkType,
    pub language: Option<String>,
    pub symbol_name: Option<String>,
    pub symbol_type: Option<String>,
    pub symbol_id: Option<String>,
    pub symbol_part_index: Option<i64>,
    pub symbol_part_count: Option<i64>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub char_start: Option<i64>,
    pub char_end: Option<i64>,
    pub token_count: i64,
    pub content: String,
    pub context_path: String,
}

/// A formatted search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub path: String,
    pub uri: String,
    pub source_name: String,
    pub context_path: String,
    pub slice: String,
    pub preview: String,
    pub token_count: i64,
    pub score: f64,
    pub confidence: f64,
}
