//! GitHub sync engine (spec §4.3): list tags/default branch, download and
//! extract a ref's archive, filter and chunk its files, and write them to a
//! library DB under one version label.

pub mod archive;
pub mod filter;
pub mod version;

use crate::chunk;
use crate::errors::GithubSyncError;
use crate::models::IngestMode;
use crate::store::library;
use sqlx::SqlitePool;
use std::time::Duration;

const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Repository metadata needed to plan a sync: default branch and tag list
/// (spec §4.3 "Versioning").
pub async fn fetch_repo_metadata(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    token: Option<&str>,
) -> Result<(String, Vec<String>), GithubSyncError> {
    let default_branch = fetch_default_branch(client, owner, repo, token).await?;
    let tags = fetch_tags(client, owner, repo, token).await?;
    Ok((default_branch, tags))
}

async fn github_get(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
) -> Result<reqwest::Response, GithubSyncError> {
    let mut request = client
        .get(url)
        .timeout(API_TIMEOUT)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "docvault");
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }
    request
        .send()
        .await
        .map_err(|e| GithubSyncError::Retryable(e.to_string()))
}

async fn fetch_default_branch(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    token: Option<&str>,
) -> Result<String, GithubSyncError> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}");
    let response = github_get(client, &url, token).await?;
    match response.status().as_u16() {
        401 => return Err(GithubSyncError::TokenInvalid),
        403 => return Err(GithubSyncError::AccessDenied { rate_limited: true }),
        404 => return Err(GithubSyncError::NotFound),
        200..=299 => {}
        other => return Err(GithubSyncError::Retryable(format!("status {other}"))),
    }
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| GithubSyncError::Retryable(e.to_string()))?;
    Ok(body
        .get("default_branch")
        .and_then(|v| v.as_str())
        .unwrap_or("main")
        .to_string())
}

async fn fetch_tags(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    token: Option<&str>,
) -> Result<Vec<String>, GithubSyncError> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/tags?per_page=100");
    let response = github_get(client, &url, token).await?;
    if !response.status().is_success() {
        return Ok(Vec::new());
    }
    let body: Vec<serde_json::Value> = response
        .json()
        .await
        .map_err(|e| GithubSyncError::Retryable(e.to_string()))?;
    Ok(body
        .into_iter()
        .filter_map(|entry| entry.get("name").and_then(|v| v.as_str()).map(String::from))
        .collect())
}

pub struct VersionSyncOutcome {
    pub commit_sha: Option<String>,
    pub etag: Option<String>,
    pub documents_ingested: u64,
    pub documents_kept_active: u64,
}

/// Sync one `(owner, repo, git_ref)` into `version_label` of `pool` (spec
/// §4.3 steps 1-6, §4.5 "GitHub branch"). `docs_path`/`ingest_mode` narrow
/// which extracted files are kept.
#[allow(clippy::too_many_arguments)]
pub async fn sync_version(
    client: &reqwest::Client,
    pool: &SqlitePool,
    owner: &str,
    repo: &str,
    git_ref: &str,
    version_label: &str,
    token: Option<&str>,
    prev_etag: Option<&str>,
    prev_sha: Option<&str>,
    docs_path: Option<&str>,
    ingest_mode: IngestMode,
    force: bool,
) -> Result<VersionSyncOutcome, GithubSyncError> {
    let outcome = archive::download(
        client,
        owner,
        repo,
        git_ref,
        token,
        prev_etag,
        archive::DEFAULT_SIZE_LIMIT,
    )
    .await?;

    let archive::DownloadOutcome::Ok {
        bytes,
        etag,
        resolved_url,
        commit_sha_header,
    } = outcome
    else {
        let kept_active = library::count_active_documents(pool, version_label)
            .await
            .map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;
        return Ok(VersionSyncOutcome {
            commit_sha: prev_sha.map(String::from),
            etag: prev_etag.map(String::from),
            documents_ingested: 0,
            documents_kept_active: kept_active,
        });
    };

    let work_dir = tempfile::tempdir().map_err(GithubSyncError::Io)?;
    let (top_level_dir, files) = archive::extract(&bytes, None, work_dir.path())?;
    let commit_sha = archive::recover_commit_sha(
        commit_sha_header.as_deref(),
        &top_level_dir,
        &resolved_url,
        prev_sha,
    );

    // spec §4.3 step 6: a resolved SHA equal to the previous one is treated
    // as not-modified unless the caller forced a re-sync, even when the
    // archive endpoint itself returned 200 instead of 304.
    if !force && commit_sha.is_some() && commit_sha.as_deref() == prev_sha {
        let kept_active = library::count_active_documents(pool, version_label)
            .await
            .map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;
        return Ok(VersionSyncOutcome {
            commit_sha,
            etag,
            documents_ingested: 0,
            documents_kept_active: kept_active,
        });
    }

    let mut seen_paths = Vec::new();
    for file in &files {
        if !filter::path_is_allowed(&file.rel) {
            continue;
        }
        if let Some(base) = docs_path {
            if !file.rel.starts_with(base) {
                continue;
            }
        }
        let Ok(metadata) = std::fs::metadata(&file.abs) else {
            continue;
        };
        if metadata.len() > filter::DEFAULT_MAX_FILE_SIZE {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&file.abs) else {
            continue;
        };
        if ingest_mode == IngestMode::Docs && !content.contains("```") {
            continue;
        }

        let filename = file.rel.rsplit('/').next().unwrap_or(&file.rel);
        let is_markdown = file.rel.ends_with(".md") || file.rel.ends_with(".mdx");
        let title = if is_markdown {
            chunk::title_from_content(&content, filename)
        } else {
            filename.to_string()
        };
        let uri = format!("gh://{owner}/{repo}@{version_label}/{}", file.rel);
        let content_type = if is_markdown { "text/markdown" } else { "text/plain" };

        let upsert = library::upsert_document(
            pool,
            &file.rel,
            version_label,
            &uri,
            &title,
            &content,
            content_type,
        )
        .await
        .map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;

        if upsert.content_changed {
            let drafts = chunk::chunk_document(content, &file.rel, &title);
            library::replace_chunks(pool, &upsert.document_id, &file.rel, &uri, &title, &drafts)
                .await
                .map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;
        }

        seen_paths.push(file.rel.clone());
    }

    let kept_active = library::deactivate_unseen(pool, version_label, &seen_paths)
        .await
        .map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;

    Ok(VersionSyncOutcome {
        commit_sha,
        etag,
        documents_ingested: seen_paths.len() as u64,
        documents_kept_active: kept_active,
    })
}
