//! Index-DB operations: the `sources` and `source_versions` tables.

use crate::models::{IngestMode, Source, SourceKind, SourceVersion};
use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

fn row_to_source(row: &sqlx::sqlite::SqliteRow) -> Result<Source> {
    let kind: String = row.try_get("kind")?;
    let ingest_mode: Option<String> = row.try_get("ingest_mode")?;
    let allowed_paths: String = row.try_get("allowed_paths")?;
    let denied_paths: String = row.try_get("denied_paths")?;

    Ok(Source {
        id: row.try_get("id")?,
        kind: kind.parse::<SourceKind>()?,
        name: row.try_get("name")?,
        owner: row.try_get("owner")?,
        repo: row.try_get("repo")?,
        library_db_path: row.try_get("library_db_path")?,
        last_sync_at: row
            .try_get::<Option<String>, _>("last_sync_at")?
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        last_commit: row.try_get("last_commit")?,
        last_etag: row.try_get("last_etag")?,
        last_error: row.try_get("last_error")?,
        git_ref: row.try_get("git_ref")?,
        docs_path: row.try_get("docs_path")?,
        ingest_mode: ingest_mode
            .map(|s| s.parse::<IngestMode>())
            .transpose()?,
        version_label: row.try_get("version_label")?,
        root_url: row.try_get("root_url")?,
        allowed_paths: serde_json::from_str(&allowed_paths).unwrap_or_default(),
        denied_paths: serde_json::from_str(&denied_paths).unwrap_or_default(),
        max_depth: row.try_get("max_depth")?,
        max_pages: row.try_get("max_pages")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("created_at")?)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("updated_at")?)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub async fn insert_source(pool: &SqlitePool, source: &Source) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sources (
            id, kind, name, owner, repo, library_db_path,
            last_sync_at, last_commit, last_etag, last_error,
            git_ref, docs_path, ingest_mode, version_label,
            root_url, allowed_paths, denied_paths, max_depth, max_pages,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&source.id)
    .bind(source.kind.as_str())
    .bind(&source.name)
    .bind(&source.owner)
    .bind(&source.repo)
    .bind(&source.library_db_path)
    .bind(source.last_sync_at.map(|d| d.to_rfc3339()))
    .bind(&source.last_commit)
    .bind(&source.last_etag)
    .bind(&source.last_error)
    .bind(&source.git_ref)
    .bind(&source.docs_path)
    .bind(source.ingest_mode.map(|m| m.to_string_value()))
    .bind(&source.version_label)
    .bind(&source.root_url)
    .bind(serde_json::to_string(&source.allowed_paths)?)
    .bind(serde_json::to_string(&source.denied_paths)?)
    .bind(source.max_depth)
    .bind(source.max_pages)
    .bind(source.created_at.to_rfc3339())
    .bind(source.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_source_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Source>> {
    let row = sqlx::query("SELECT * FROM sources WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_source).transpose()
}

pub async fn get_source_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Source>> {
    let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_source).transpose()
}

pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<Source>> {
    let rows = sqlx::query("SELECT * FROM sources ORDER BY name")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_source).collect()
}

pub async fn delete_source(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM source_versions WHERE source_id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM sources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the outcome of a sync: last_sync_at/last_commit/last_etag/last_error
/// on the source row (spec §4.5 step 2).
pub async fn record_sync_outcome(
    pool: &SqlitePool,
    source_id: &str,
    commit: Option<&str>,
    etag: Option<&str>,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sources SET
            last_sync_at = ?, last_commit = ?, last_etag = ?, last_error = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(commit)
    .bind(etag)
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .bind(source_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replace the `(source, version_label)` row — "one row per label, replaced
/// on each successful sync" (spec §3 `SourceVersion`).
pub async fn upsert_source_version(pool: &SqlitePool, version: &SourceVersion) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO source_versions (source_id, version_label, git_ref, commit_sha, tree_hash, etag, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, version_label) DO UPDATE SET
            git_ref = excluded.git_ref,
            commit_sha = excluded.commit_sha,
            tree_hash = excluded.tree_hash,
            etag = excluded.etag,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(&version.source_id)
    .bind(&version.version_label)
    .bind(&version.git_ref)
    .bind(&version.commit_sha)
    .bind(&version.tree_hash)
    .bind(&version.etag)
    .bind(version.synced_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_source_versions(pool: &SqlitePool, source_id: &str) -> Result<Vec<SourceVersion>> {
    let rows = sqlx::query(
        "SELECT * FROM source_versions WHERE source_id = ? ORDER BY version_label",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SourceVersion {
                source_id: row.try_get("source_id")?,
                version_label: row.try_get("version_label")?,
                git_ref: row.try_get("git_ref")?,
                commit_sha: row.try_get("commit_sha")?,
                tree_hash: row.try_get("tree_hash")?,
                etag: row.try_get("etag")?,
                synced_at: chrono::DateTime::parse_from_rfc3339(
                    &row.try_get::<String, _>("synced_at")?,
                )
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            })
        })
        .collect()
}

impl IngestMode {
    fn to_string_value(self) -> &'static str {
        match self {
            IngestMode::Docs => "docs",
            IngestMode::Repo => "repo",
        }
    }
}
