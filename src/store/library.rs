//! Library-DB operations: documents, blobs, chunks, vectors, crawl queue.
//!
//! Exposes the "small, transactional operations" named in spec §4.1: upsert
//! document, insert/replace chunks, deactivate stale documents, embedding
//! upsert/clear, FTS and vector search, cleanup, and the crawl-page queue.

use crate::models::{Chunk, ChunkDraft, ChunkType, CrawlPage, CrawlPageStatus};
use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of [`upsert_document`]: the document id and whether its content
/// hash changed (callers use this to decide whether to rebuild chunks).
pub struct UpsertOutcome {
    pub document_id: String,
    pub content_changed: bool,
}

/// Insert the blob if unseen, insert-or-update the document row, and report
/// whether the content hash changed (spec §4.1, §3 invariant 1 and 4).
pub async fn upsert_document(
    pool: &SqlitePool,
    path: &str,
    version_label: &str,
    uri: &str,
    title: &str,
    content: &str,
    content_type: &str,
) -> Result<UpsertOutcome> {
    let hash = sha256_hex(content);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO document_blobs (hash, content) VALUES (?, ?) ON CONFLICT(hash) DO NOTHING",
    )
    .bind(&hash)
    .bind(content)
    .execute(pool)
    .await?;

    let existing: Option<(String, String)> = sqlx::query(
        "SELECT id, hash FROM documents WHERE path = ? AND version_label = ?",
    )
    .bind(path)
    .bind(version_label)
    .fetch_optional(pool)
    .await?
    .map(|row| (row.get("id"), row.get("hash")));

    match existing {
        Some((id, existing_hash)) => {
            let content_changed = existing_hash != hash;
            sqlx::query(
                r#"
                UPDATE documents SET
                    uri = ?, title = ?, hash = ?, content_type = ?, active = 1, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(uri)
            .bind(title)
            .bind(&hash)
            .bind(content_type)
            .bind(&now)
            .bind(&id)
            .execute(pool)
            .await?;
            Ok(UpsertOutcome {
                document_id: id,
                content_changed,
            })
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO documents (
                    id, path, version_label, uri, title, hash, content_type, active, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(path)
            .bind(version_label)
            .bind(uri)
            .bind(title)
            .bind(&hash)
            .bind(content_type)
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await?;
            Ok(UpsertOutcome {
                document_id: id,
                content_changed: true,
            })
        }
    }
}

/// Delete and rebuild a document's chunks atomically (spec §3 invariant 3).
pub async fn replace_chunks(
    pool: &SqlitePool,
    document_id: &str,
    doc_path: &str,
    doc_uri: &str,
    doc_title: &str,
    drafts: &[ChunkDraft],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for (position, draft) in drafts.iter().enumerate() {
        let chunk_sha = sha256_hex(&format!("{}:{}:{}", document_id, position, draft.content));
        sqlx::query(
            r#"
            INSERT INTO chunks (
                document_id, position, chunk_type, language,
                symbol_name, symbol_type, symbol_id, symbol_part_index, symbol_part_count,
                line_start, line_end, char_start, char_end, token_count, chunk_sha, content,
                doc_path, doc_uri, doc_title, context_path
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(position as i64)
        .bind(draft.chunk_type.as_str())
        .bind(&draft.language)
        .bind(&draft.symbol_name)
        .bind(&draft.symbol_type)
        .bind(&draft.symbol_id)
        .bind(draft.symbol_part_index)
        .bind(draft.symbol_part_count)
        .bind(draft.line_start)
        .bind(draft.line_end)
        .bind(draft.char_start)
        .bind(draft.char_end)
        .bind(draft.token_count)
        .bind(&chunk_sha)
        .bind(&draft.content)
        .bind(doc_path)
        .bind(doc_uri)
        .bind(doc_title)
        .bind(&draft.context_path)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Mark every document of `version_label` whose path is not in `seen_paths`
/// as inactive (spec §3 invariant 2, §4.5 step 2/3).
pub async fn deactivate_unseen(
    pool: &SqlitePool,
    version_label: &str,
    seen_paths: &[String],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE documents SET active = 0 WHERE version_label = ?")
        .bind(version_label)
        .execute(&mut *tx)
        .await?;

    let mut reactivated = 0u64;
    for path in seen_paths {
        let result = sqlx::query(
            "UPDATE documents SET active = 1 WHERE version_label = ? AND path = ?",
        )
        .bind(version_label)
        .bind(path)
        .execute(&mut *tx)
        .await?;
        reactivated += result.rows_affected();
    }
    tx.commit().await?;
    Ok(reactivated)
}

/// Count currently-active documents for a version label, used to report
/// `documents_kept_active` on a not-modified sync that skips re-processing.
pub async fn count_active_documents(pool: &SqlitePool, version_label: &str) -> Result<u64> {
    let n: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents WHERE version_label = ? AND active = 1",
    )
    .bind(version_label)
    .fetch_one(pool)
    .await?;
    Ok(n as u64)
}

/// Garbage-collect inactive documents (and their chunks/vectors via FK
/// cascade-by-hand) and any blob no longer referenced by a document.
pub async fn cleanup_inactive(pool: &SqlitePool) -> Result<(u64, u64)> {
    let inactive_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM documents WHERE active = 0")
            .fetch_all(pool)
            .await?;

    let mut tx = pool.begin().await?;
    for id in &inactive_ids {
        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    let orphan_blobs: Vec<String> = sqlx::query_scalar(
        "SELECT hash FROM document_blobs WHERE hash NOT IN (SELECT hash FROM documents)",
    )
    .fetch_all(&mut *tx)
    .await?;
    for hash in &orphan_blobs {
        sqlx::query("DELETE FROM document_blobs WHERE hash = ?")
            .bind(hash)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok((inactive_ids.len() as u64, orphan_blobs.len() as u64))
}

/// A full document row joined with its blob content, for `docvault get`.
pub struct DocumentRecord {
    pub id: String,
    pub path: String,
    pub version_label: String,
    pub uri: String,
    pub title: String,
    pub content_type: String,
    pub active: bool,
    pub content: String,
}

fn row_to_document_record(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        path: row.try_get("path")?,
        version_label: row.try_get("version_label")?,
        uri: row.try_get("uri")?,
        title: row.try_get("title")?,
        content_type: row.try_get("content_type")?,
        active: row.try_get::<i64, _>("active")? != 0,
        content: row.try_get("content")?,
    })
}

/// Fetch a document and its blob content by id (spec §6 `get --doc ID`).
pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRecord>> {
    let row = sqlx::query(
        r#"
        SELECT d.id, d.path, d.version_label, d.uri, d.title, d.content_type, d.active,
               b.content AS content
        FROM documents d JOIN document_blobs b ON b.hash = d.hash
        WHERE d.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_document_record).transpose()
}

pub async fn find_document_by_path(
    pool: &SqlitePool,
    path: &str,
    version_label: Option<&str>,
) -> Result<Option<String>> {
    let row = if let Some(label) = version_label {
        sqlx::query_scalar("SELECT id FROM documents WHERE path = ? AND version_label = ?")
            .bind(path)
            .bind(label)
            .fetch_optional(pool)
            .await?
    } else {
        sqlx::query_scalar("SELECT id FROM documents WHERE path = ? ORDER BY updated_at DESC LIMIT 1")
            .bind(path)
            .fetch_optional(pool)
            .await?
    };
    Ok(row)
}

/// Find a document id by its exact `uri` (spec §6 "URI scheme for GitHub
/// documents"), preferring the most recently updated match.
pub async fn find_document_by_uri(pool: &SqlitePool, uri: &str) -> Result<Option<String>> {
    let row = sqlx::query_scalar(
        "SELECT id FROM documents WHERE uri = ? ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(uri)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List every chunk of a document in position order (spec §6 `get`
/// response, §8 invariant 5 "no two chunks of the same document share the
/// same position").
pub async fn list_chunks_for_document(pool: &SqlitePool, document_id: &str) -> Result<Vec<Chunk>> {
    let rows = sqlx::query("SELECT * FROM chunks WHERE document_id = ? ORDER BY position ASC")
        .bind(document_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_chunk).collect()
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
    let chunk_type: String = row.try_get("chunk_type")?;
    Ok(Chunk {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        position: row.try_get("position")?,
        chunk_type: chunk_type.parse::<ChunkType>()?,
        language: row.try_get("language")?,
        symbol_name: row.try_get("symbol_name")?,
        symbol_type: row.try_get("symbol_type")?,
        symbol_id: row.try_get("symbol_id")?,
        symbol_part_index: row.try_get("symbol_part_index")?,
        symbol_part_count: row.try_get("symbol_part_count")?,
        line_start: row.try_get("line_start")?,
        line_end: row.try_get("line_end")?,
        char_start: row.try_get("char_start")?,
        char_end: row.try_get("char_end")?,
        token_count: row.try_get("token_count")?,
        chunk_sha: row.try_get("chunk_sha")?,
        content: row.try_get("content")?,
        doc_path: row.try_get("doc_path")?,
        doc_uri: row.try_get("doc_uri")?,
        doc_title: row.try_get("doc_title")?,
        context_path: row.try_get("context_path")?,
    })
}

/// A keyword search hit: the chunk plus its normalized BM25 score.
pub struct FtsHit {
    pub chunk: Chunk,
    pub score: f64,
}

/// Search-FTS contract (spec §4.1): try the verbatim query; on a syntax
/// error retry with a normalized (alnum + whitespace) form. Score is
/// `1 / (1 + |bm25|)` so larger is better.
pub async fn search_fts(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
    version_label: Option<&str>,
) -> Result<Vec<FtsHit>> {
    match search_fts_raw(pool, query, limit, version_label).await {
        Ok(hits) => Ok(hits),
        Err(_) => {
            let normalized = normalize_fts_query(query);
            if normalized.trim().is_empty() {
                return Ok(Vec::new());
            }
            search_fts_raw(pool, &normalized, limit, version_label).await
        }
    }
}

fn normalize_fts_query(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

async fn search_fts_raw(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
    version_label: Option<&str>,
) -> Result<Vec<FtsHit>> {
    let sql = r#"
        SELECT c.*, bm25(chunks_fts) AS bm25_score
        FROM chunks_fts
        JOIN chunks c ON c.id = chunks_fts.rowid
        JOIN documents d ON d.id = c.document_id
        WHERE chunks_fts MATCH ? AND d.active = 1 AND (? IS NULL OR d.version_label = ?)
        ORDER BY bm25(chunks_fts)
        LIMIT ?
    "#;
    let rows = sqlx::query(sql)
        .bind(query)
        .bind(version_label)
        .bind(version_label)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let bm25_score: f64 = row.try_get("bm25_score")?;
            Ok(FtsHit {
                chunk: row_to_chunk(row)?,
                score: 1.0 / (1.0 + bm25_score.abs()),
            })
        })
        .collect()
}

/// A vector search hit: the chunk plus the raw cosine distance (not yet
/// converted to similarity — the caller does `1 / (1 + distance)`).
pub struct VectorHit {
    pub chunk: Chunk,
    pub distance: f64,
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (norm_a * norm_b)) as f64
}

/// Brute-force cosine search over `chunk_vectors` (spec §4.1 search-vector
/// contract). No native vector-index extension is assumed to be present, so
/// this scans every row for the model; acceptable for a single-library,
/// single-process store at the scale this system targets.
pub async fn search_vector(
    pool: &SqlitePool,
    model_uri: &str,
    query_vector: &[f32],
    limit: i64,
    version_label: Option<&str>,
) -> Result<Vec<VectorHit>> {
    let sql = r#"
        SELECT c.*, cv.embedding AS embedding
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        JOIN documents d ON d.id = c.document_id
        WHERE cv.model_uri = ? AND d.active = 1 AND (? IS NULL OR d.version_label = ?)
    "#;
    let rows = sqlx::query(sql)
        .bind(model_uri)
        .bind(version_label)
        .bind(version_label)
        .fetch_all(pool)
        .await?;

    let mut hits: Vec<VectorHit> = rows
        .iter()
        .map(|row| -> Result<VectorHit> {
            let embedding: Vec<u8> = row.try_get("embedding")?;
            let vector = blob_to_vec(&embedding);
            let distance = cosine_distance(query_vector, &vector);
            Ok(VectorHit {
                chunk: row_to_chunk(row)?,
                distance,
            })
        })
        .collect::<Result<_>>()?;

    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit.max(0) as usize);
    Ok(hits)
}

/// Insert or replace one `(chunk_id, model_uri)` vector row.
pub async fn upsert_embedding(
    pool: &SqlitePool,
    chunk_id: i64,
    document_id: &str,
    model_uri: &str,
    dims: i64,
    embedding: &[u8],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, model_uri, dims, embedding)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id, model_uri) DO UPDATE SET
            document_id = excluded.document_id,
            dims = excluded.dims,
            embedding = excluded.embedding
        "#,
    )
    .bind(chunk_id)
    .bind(document_id)
    .bind(model_uri)
    .bind(dims)
    .bind(embedding)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear every embedding for a model (used before rebuilding after a
/// dimensionality change, spec §8 scenario 6).
pub async fn clear_embeddings(pool: &SqlitePool, model_uri: &str) -> Result<()> {
    sqlx::query("DELETE FROM chunk_vectors WHERE model_uri = ?")
        .bind(model_uri)
        .execute(pool)
        .await?;
    Ok(())
}

/// Chunks that have no vector row yet (or whose model differs), used to
/// drive `embed [--force]`.
pub async fn find_chunks_missing_embedding(
    pool: &SqlitePool,
    model_uri: &str,
    limit: i64,
) -> Result<Vec<Chunk>> {
    let rows = sqlx::query(
        r#"
        SELECT c.* FROM chunks c
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id AND cv.model_uri = ?
        WHERE cv.chunk_id IS NULL
        ORDER BY c.document_id, c.position
        LIMIT ?
        "#,
    )
    .bind(model_uri)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_chunk).collect()
}

// ── Crawl queue ──────────────────────────────────────────────────────────

fn row_to_crawl_page(row: &sqlx::sqlite::SqliteRow) -> Result<CrawlPage> {
    let status: String = row.try_get("status")?;
    Ok(CrawlPage {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        url: row.try_get("url")?,
        normalized_url: row.try_get("normalized_url")?,
        depth: row.try_get("depth")?,
        status: status.parse::<CrawlPageStatus>()?,
        last_error: row.try_get("last_error")?,
    })
}

/// Insert a page if `(source_id, normalized_url)` is new; never replaces an
/// existing row (spec §4.4 step 6: "without replacing existing rows").
pub async fn upsert_crawl_page(
    pool: &SqlitePool,
    source_id: &str,
    url: &str,
    normalized_url: &str,
    depth: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO crawl_pages (source_id, url, normalized_url, depth, status)
        VALUES (?, ?, ?, ?, 'pending')
        ON CONFLICT(source_id, normalized_url) DO NOTHING
        "#,
    )
    .bind(source_id)
    .bind(url)
    .bind(normalized_url)
    .bind(depth)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically claim the next `pending` page in BFS order `(depth, id)`,
/// marking it `fetching` (spec §4.4, §5 "Ordering"). Failed pages from a
/// prior run are requeued to `pending` once at the start of a crawl run by
/// [`requeue_failed_pages`], not claimed directly here.
pub async fn claim_next_page(pool: &SqlitePool, source_id: &str) -> Result<Option<CrawlPage>> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r#"
        SELECT * FROM crawl_pages
        WHERE source_id = ? AND status = 'pending'
        ORDER BY depth ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(source_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };
    let page = row_to_crawl_page(&row)?;

    sqlx::query("UPDATE crawl_pages SET status = 'fetching' WHERE id = ?")
        .bind(page.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Some(page))
}

pub async fn mark_page_done(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE crawl_pages SET status = 'done', last_error = NULL WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_page_failed(pool: &SqlitePool, id: i64, reason: &str) -> Result<()> {
    sqlx::query("UPDATE crawl_pages SET status = 'failed', last_error = ? WHERE id = ?")
        .bind(reason)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Reset every `failed` page back to `pending` so a fresh run retries them
/// exactly once (spec §4.4 "Resumability": "pending and failed pages are
/// picked up again" on restart). Called once at the start of a crawl run,
/// not per-claim, so a page that fails again this run does not get
/// reclaimed in an infinite loop within the same invocation.
pub async fn requeue_failed_pages(pool: &SqlitePool, source_id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE crawl_pages SET status = 'pending' WHERE source_id = ? AND status = 'failed'")
        .bind(source_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Clear the whole queue (used when `--force` repeats discovery).
pub async fn clear_crawl_queue(pool: &SqlitePool, source_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM crawl_pages WHERE source_id = ?")
        .bind(source_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn crawl_queue_counts(pool: &SqlitePool, source_id: &str) -> Result<(i64, i64, i64, i64)> {
    async fn count(pool: &SqlitePool, source_id: &str, status: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM crawl_pages WHERE source_id = ? AND status = ?",
        )
        .bind(source_id)
        .bind(status)
        .fetch_one(pool)
        .await?;
        Ok(n)
    }
    Ok((
        count(pool, source_id, "pending").await?,
        count(pool, source_id, "fetching").await?,
        count(pool, source_id, "done").await?,
        count(pool, source_id, "failed").await?,
    ))
}

pub async fn has_any_crawl_pages(pool: &SqlitePool, source_id: &str) -> Result<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crawl_pages WHERE source_id = ?")
        .bind(source_id)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::migrations::run_library_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_library_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upsert_document_reports_content_change_only_when_hash_differs() {
        let pool = memory_pool().await;
        let outcome1 = upsert_document(&pool, "a.md", "main", "gh://o/r@main/a.md", "A", "hello", "text/markdown")
            .await
            .unwrap();
        assert!(outcome1.content_changed);

        let outcome2 = upsert_document(&pool, "a.md", "main", "gh://o/r@main/a.md", "A", "hello", "text/markdown")
            .await
            .unwrap();
        assert!(!outcome2.content_changed);
        assert_eq!(outcome1.document_id, outcome2.document_id);

        let outcome3 = upsert_document(&pool, "a.md", "main", "gh://o/r@main/a.md", "A", "hello world", "text/markdown")
            .await
            .unwrap();
        assert!(outcome3.content_changed);
    }

    #[tokio::test]
    async fn fts_search_finds_inserted_chunk_and_score_is_positive() {
        let pool = memory_pool().await;
        let outcome = upsert_document(&pool, "a.md", "main", "gh://o/r@main/a.md", "A", "hello", "text/markdown")
            .await
            .unwrap();
        let draft = ChunkDraft {
            chunk_type: ChunkType::Doc,
            language: None,
            symbol_name: None,
            symbol_type: None,
            symbol_id: None,
            symbol_part_index: None,
            symbol_part_count: None,
            line_start: Some(1),
            line_end: Some(1),
            char_start: Some(0),
            char_end: Some(20),
            token_count: 5,
            content: "hello distinctive_keyword world".to_string(),
            context_path: "A".to_string(),
        };
        replace_chunks(&pool, &outcome.document_id, "a.md", "gh://o/r@main/a.md", "A", &[draft])
            .await
            .unwrap();

        let hits = search_fts(&pool, "distinctive_keyword", 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn deactivate_unseen_only_keeps_seen_paths_active() {
        let pool = memory_pool().await;
        upsert_document(&pool, "a.md", "main", "u", "A", "x", "text/markdown").await.unwrap();
        upsert_document(&pool, "b.md", "main", "u", "B", "y", "text/markdown").await.unwrap();

        deactivate_unseen(&pool, "main", &["a.md".to_string()]).await.unwrap();

        let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE active = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn crawl_queue_transitions_pending_fetching_done() {
        let pool = memory_pool().await;
        upsert_crawl_page(&pool, "src1", "https://x/a", "https://x/a", 0).await.unwrap();

        let page = claim_next_page(&pool, "src1").await.unwrap().unwrap();
        assert_eq!(page.status, CrawlPageStatus::Fetching);

        mark_page_done(&pool, page.id).await.unwrap();
        let (pending, fetching, done, failed) = crawl_queue_counts(&pool, "src1").await.unwrap();
        assert_eq!((pending, fetching, done, failed), (0, 0, 1, 0));
    }
}
