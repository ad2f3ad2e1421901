//! Source registration, status reporting, and kind detection.
//!
//! Backs the `add`/`source add`, `source list`, `source remove`, `status`,
//! and `detect` CLI commands (spec §6, §11 "Supplemented features").

use crate::models::{IngestMode, Source, SourceKind, SourceVersion};
use crate::paths;
use crate::store::index;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

/// Parameters for registering a GitHub-kind source.
#[derive(Debug, Clone, Default)]
pub struct GithubSourceParams {
    pub name: String,
    pub owner: String,
    pub repo: String,
    pub git_ref: Option<String>,
    pub docs_path: Option<String>,
    pub ingest_mode: Option<IngestMode>,
    pub version_label: Option<String>,
}

/// Parameters for registering a Web-kind source.
#[derive(Debug, Clone, Default)]
pub struct WebSourceParams {
    pub name: String,
    pub root_url: String,
    pub allowed_paths: Vec<String>,
    pub denied_paths: Vec<String>,
    pub max_depth: Option<i64>,
    pub max_pages: Option<i64>,
    pub version_label: Option<String>,
}

async fn insert_new_source(pool: &SqlitePool, mut source: Source) -> Result<Source> {
    if index::get_source_by_name(pool, &source.name).await?.is_some() {
        bail!("a source named {:?} already exists", source.name);
    }
    let now = Utc::now();
    source.created_at = now;
    source.updated_at = now;
    index::insert_source(pool, &source).await?;
    Ok(source)
}

/// Register a GitHub-kind source. The library DB filename is derived from
/// `owner/repo` so renaming the source's display name never orphans it
/// (spec §4.1 "Library paths are derived from owner/repo... plus source id").
pub async fn add_github_source(pool: &SqlitePool, params: GithubSourceParams) -> Result<Source> {
    if params.name.trim().is_empty() {
        bail!("source name must not be empty");
    }
    let source_id = uuid::Uuid::new_v4().to_string();
    let library_db_path = paths::library_db_path(Some((&params.owner, &params.repo)), &source_id)
        .to_string_lossy()
        .to_string();

    let source = Source {
        id: source_id,
        kind: SourceKind::Github,
        name: params.name,
        owner: Some(params.owner),
        repo: Some(params.repo),
        library_db_path,
        last_sync_at: None,
        last_commit: None,
        last_etag: None,
        last_error: None,
        git_ref: params.git_ref,
        docs_path: params.docs_path,
        ingest_mode: Some(params.ingest_mode.unwrap_or(IngestMode::Docs)),
        version_label: params.version_label,
        root_url: None,
        allowed_paths: Vec::new(),
        denied_paths: Vec::new(),
        max_depth: None,
        max_pages: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    insert_new_source(pool, source).await
}

/// Register a Web-kind source.
pub async fn add_web_source(pool: &SqlitePool, params: WebSourceParams) -> Result<Source> {
    if params.name.trim().is_empty() {
        bail!("source name must not be empty");
    }
    let source_id = uuid::Uuid::new_v4().to_string();
    let library_db_path = paths::library_db_path(None, &source_id)
        .to_string_lossy()
        .to_string();

    let source = Source {
        id: source_id,
        kind: SourceKind::Web,
        name: params.name,
        owner: None,
        repo: None,
        library_db_path,
        last_sync_at: None,
        last_commit: None,
        last_etag: None,
        last_error: None,
        git_ref: None,
        docs_path: None,
        ingest_mode: None,
        version_label: params.version_label,
        root_url: Some(params.root_url),
        allowed_paths: params.allowed_paths,
        denied_paths: params.denied_paths,
        max_depth: params.max_depth,
        max_pages: params.max_pages,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    insert_new_source(pool, source).await
}

/// Resolve a source by name or id, whichever matches (CLI commands accept
/// either, e.g. `source remove ID`, `ingest --source NAME`).
pub async fn resolve_source(pool: &SqlitePool, name_or_id: &str) -> Result<Source> {
    if let Some(source) = index::get_source_by_name(pool, name_or_id).await? {
        return Ok(source);
    }
    index::get_source_by_id(pool, name_or_id)
        .await?
        .with_context(|| format!("unknown source: {name_or_id}"))
}

/// Remove a source's registration from the index DB. The library DB file
/// itself is left on disk — this only drops the index-level pointer to it,
/// matching spec §3's "never implicitly deleted" lifecycle note (deleting
/// the underlying file is a separate, explicit operation).
pub async fn remove_source(pool: &SqlitePool, name_or_id: &str) -> Result<()> {
    let source = resolve_source(pool, name_or_id).await?;
    index::delete_source(pool, &source.id).await
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: String,
    pub last_sync_at: Option<String>,
    pub last_commit: Option<String>,
    pub last_error: Option<String>,
    pub versions: Vec<String>,
}

/// Status of every registered source: last sync bookkeeping plus the
/// version labels known for it (spec §11 "`status`... read-only,
/// store-only").
pub async fn status(pool: &SqlitePool) -> Result<Vec<SourceStatus>> {
    let mut out = Vec::new();
    for source in index::list_sources(pool).await? {
        let versions: Vec<SourceVersion> = index::list_source_versions(pool, &source.id).await?;
        out.push(SourceStatus {
            name: source.name,
            kind: source.kind.as_str().to_string(),
            last_sync_at: source.last_sync_at.map(|d| d.to_rfc3339()),
            last_commit: source.last_commit,
            last_error: source.last_error,
            versions: versions.into_iter().map(|v| v.version_label).collect(),
        });
    }
    Ok(out)
}

pub fn print_status(statuses: &[SourceStatus], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }
    for s in statuses {
        println!("{} ({})", s.name, s.kind);
        println!("  last_sync_at: {}", s.last_sync_at.as_deref().unwrap_or("never"));
        println!("  last_commit:  {}", s.last_commit.as_deref().unwrap_or("-"));
        if let Some(err) = &s.last_error {
            println!("  last_error:   {err}");
        }
        println!("  versions:     {}", s.versions.join(", "));
    }
    Ok(())
}

pub fn print_source_list(sources: &[Source], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sources)?);
        return Ok(());
    }
    println!("{:<24} {:<8} {:<24} LAST SYNC", "NAME", "KIND", "OWNER/REPO OR URL");
    for s in sources {
        let identity = match s.kind {
            SourceKind::Github => format!(
                "{}/{}",
                s.owner.as_deref().unwrap_or("?"),
                s.repo.as_deref().unwrap_or("?")
            ),
            SourceKind::Web => s.root_url.clone().unwrap_or_default(),
        };
        println!(
            "{:<24} {:<8} {:<24} {}",
            s.name,
            s.kind.as_str(),
            identity,
            s.last_sync_at.map(|d| d.to_rfc3339()).as_deref().unwrap_or("never")
        );
    }
    Ok(())
}

/// A source kind inferred from a bare identifier (spec §11 `detect`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Detected {
    Github {
        owner: String,
        repo: String,
        docs_path: Option<String>,
        ingest_mode: String,
    },
    Web {
        root_url: String,
    },
}

/// Classify a bare string as a GitHub repo or a web root, without
/// performing any network I/O (spec §11 "`detect`... without performing any
/// I/O beyond what's needed to classify it").
///
/// Recognizes `owner/repo` shorthand and `https://github.com/owner/repo`
/// URLs as GitHub; anything else starting with `http(s)://` is a Web
/// source.
pub fn detect(input: &str) -> Result<Detected> {
    let trimmed = input.trim();

    if let Some(rest) = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
    {
        let mut parts = rest.trim_end_matches('/').splitn(2, '/');
        let owner = parts.next().filter(|s| !s.is_empty());
        let repo = parts.next().filter(|s| !s.is_empty());
        if let (Some(owner), Some(repo)) = (owner, repo) {
            return Ok(Detected::Github {
                owner: owner.to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
                docs_path: Some("docs".to_string()),
                ingest_mode: "docs".to_string(),
            });
        }
        bail!("could not parse github url: {trimmed}");
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Detected::Web {
            root_url: trimmed.to_string(),
        });
    }

    let mut parts = trimmed.splitn(2, '/');
    let owner = parts.next().filter(|s| !s.is_empty());
    let repo = parts.next().filter(|s| !s.is_empty());
    if let (Some(owner), Some(repo)) = (owner, repo) {
        if !owner.contains('.') {
            return Ok(Detected::Github {
                owner: owner.to_string(),
                repo: repo.to_string(),
                docs_path: None,
                ingest_mode: "repo".to_string(),
            });
        }
    }

    bail!("could not classify {trimmed:?} as a github repo or a url")
}

pub fn print_detected(detected: &Detected, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(detected)?);
        return Ok(());
    }
    match detected {
        Detected::Github { owner, repo, docs_path, ingest_mode } => {
            println!("kind:        github");
            println!("owner/repo:  {owner}/{repo}");
            println!("docs_path:   {}", docs_path.as_deref().unwrap_or("(none)"));
            println!("ingest_mode: {ingest_mode}");
        }
        Detected::Web { root_url } => {
            println!("kind:     web");
            println!("root_url: {root_url}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_owner_repo_shorthand_as_github() {
        let d = detect("honojs/website").unwrap();
        assert!(matches!(d, Detected::Github { owner, repo, .. } if owner == "honojs" && repo == "website"));
    }

    #[test]
    fn detects_github_url_as_github_with_docs_path() {
        let d = detect("https://github.com/honojs/website").unwrap();
        match d {
            Detected::Github { owner, repo, docs_path, .. } => {
                assert_eq!(owner, "honojs");
                assert_eq!(repo, "website");
                assert_eq!(docs_path.as_deref(), Some("docs"));
            }
            _ => panic!("expected github"),
        }
    }

    #[test]
    fn detects_other_url_as_web() {
        let d = detect("https://hono.dev/docs/guides").unwrap();
        assert!(matches!(d, Detected::Web { root_url } if root_url == "https://hono.dev/docs/guides"));
    }

    #[test]
    fn rejects_unclassifiable_input() {
        assert!(detect("not a thing").is_err());
    }
}
