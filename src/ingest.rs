//! Ingest orchestrator (spec §4.5): drives one source's sync or crawl, feeds
//! the chunker, writes documents/chunks, deactivates stale documents, and
//! records sync metadata.

use crate::chunk;
use crate::config::Config;
use crate::crawl;
use crate::github;
use crate::models::{IngestMode, Source, SourceKind, SourceVersion};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::store::{index, library, Store};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

/// Default version label used for Web sources, which have no ref/series
/// concept of their own.
pub const WEB_VERSION_LABEL: &str = "latest";

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestSummary {
    pub source_name: String,
    pub versions_synced: usize,
    pub documents_ingested: u64,
    pub documents_kept_active: u64,
    pub pages_fetched: u64,
    pub pages_failed: u64,
    pub error: Option<String>,
    /// Commit sha of the most recently synced version plan entry, recorded
    /// on the source row (spec §3 `Source.last_commit`).
    #[serde(skip)]
    pub last_commit: Option<String>,
    #[serde(skip)]
    pub last_etag: Option<String>,
}

/// Ingest one source end to end, recording the outcome on the source row
/// regardless of success or failure (spec §4.5, §7 "Errors from one source
/// never abort processing of another").
pub async fn ingest_source(
    store: &Store,
    config: &Config,
    client: &reqwest::Client,
    source: &Source,
    force: bool,
    reporter: &dyn SyncProgressReporter,
) -> Result<IngestSummary> {
    reporter.report(SyncProgressEvent::Discovering {
        connector: source.name.clone(),
    });

    let library_pool = store
        .open_library(std::path::Path::new(&source.library_db_path))
        .await
        .with_context(|| format!("opening library db for {}", source.name))?;

    let result = match source.kind {
        SourceKind::Github => {
            ingest_github(&library_pool, &store.index_pool, config, client, source, force, reporter).await
        }
        SourceKind::Web => ingest_web(&library_pool, &store.index_pool, config, client, source, force, reporter).await,
    };

    match &result {
        Ok(summary) => {
            index::record_sync_outcome(
                &store.index_pool,
                &source.id,
                summary.last_commit.as_deref(),
                summary.last_etag.as_deref(),
                None,
            )
            .await?;
            Ok(summary.clone())
        }
        Err(e) => {
            index::record_sync_outcome(&store.index_pool, &source.id, None, None, Some(&e.to_string())).await?;
            Ok(IngestSummary {
                source_name: source.name.clone(),
                error: Some(e.to_string()),
                ..Default::default()
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn ingest_github(
    library_pool: &SqlitePool,
    index_pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
    source: &Source,
    force: bool,
    reporter: &dyn SyncProgressReporter,
) -> Result<IngestSummary> {
    let owner = source.owner.as_deref().context("github source missing owner")?;
    let repo = source.repo.as_deref().context("github source missing repo")?;
    let token = config.github.token.as_deref();

    let (default_branch, tags) = github::fetch_repo_metadata(client, owner, repo, token)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

    let known_versions = index::list_source_versions(index_pool, &source.id).await?;
    let known_labels: Vec<String> = known_versions.iter().map(|v| v.version_label.clone()).collect();
    let declared_ref = source.git_ref.as_deref().unwrap_or(&default_branch);

    let plan = crate::github::version::build_version_plan(
        &known_labels,
        source.version_label.as_deref(),
        declared_ref,
        &default_branch,
        &tag_refs,
        config.ingest.max_major_versions,
    );

    let mut summary = IngestSummary {
        source_name: source.name.clone(),
        ..Default::default()
    };

    let ingest_mode = source.ingest_mode.unwrap_or(IngestMode::Docs);
    let total = plan.len() as u64;
    for (n, entry) in plan.iter().enumerate() {
        let prior = known_versions
            .iter()
            .find(|v| v.version_label == entry.version_label);

        let outcome = github::sync_version(
            client,
            library_pool,
            owner,
            repo,
            &entry.git_ref,
            &entry.version_label,
            token,
            prior.and_then(|v| v.etag.as_deref()),
            prior.and_then(|v| v.commit_sha.as_deref()),
            source.docs_path.as_deref(),
            ingest_mode,
            force,
        )
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        index::upsert_source_version(
            index_pool,
            &SourceVersion {
                source_id: source.id.clone(),
                version_label: entry.version_label.clone(),
                git_ref: Some(entry.git_ref.clone()),
                commit_sha: outcome.commit_sha.clone(),
                tree_hash: None,
                etag: outcome.etag.clone(),
                synced_at: Utc::now(),
            },
        )
        .await?;

        summary.versions_synced += 1;
        summary.documents_ingested += outcome.documents_ingested;
        summary.documents_kept_active += outcome.documents_kept_active;
        if outcome.commit_sha.is_some() {
            summary.last_commit = outcome.commit_sha.clone();
        }
        if outcome.etag.is_some() {
            summary.last_etag = outcome.etag.clone();
        }

        reporter.report(SyncProgressEvent::Ingesting {
            connector: source.name.clone(),
            n: n as u64 + 1,
            total,
        });
    }

    Ok(summary)
}

async fn ingest_web(
    library_pool: &SqlitePool,
    index_pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
    source: &Source,
    force: bool,
    reporter: &dyn SyncProgressReporter,
) -> Result<IngestSummary> {
    let root_url = source.root_url.as_deref().context("web source missing root_url")?;
    let allow_subdomains = false;

    let crawl_outcome = crawl::crawl_source(
        library_pool,
        client,
        &source.id,
        root_url,
        allow_subdomains,
        &source.allowed_paths,
        &source.denied_paths,
        source.max_depth,
        source.max_pages,
        force,
        &config.crawl,
        &config.headless,
    )
    .await?;

    let version_label = source.version_label.as_deref().unwrap_or(WEB_VERSION_LABEL);
    let mut seen_paths = Vec::new();
    let total = crawl_outcome.fetched.len() as u64;

    for (n, document) in crawl_outcome.fetched.iter().enumerate() {
        let path = format!("{}.md", document.path);
        let content_type = "text/markdown";

        let upsert = library::upsert_document(
            library_pool,
            &path,
            version_label,
            &document.uri,
            &document.title,
            &document.markdown,
            content_type,
        )
        .await?;

        if upsert.content_changed {
            let drafts = chunk::chunk_document(document.markdown.clone(), &path, &document.title);
            library::replace_chunks(
                library_pool,
                &upsert.document_id,
                &path,
                &document.uri,
                &document.title,
                &drafts,
            )
            .await?;
        }
        seen_paths.push(path);

        reporter.report(SyncProgressEvent::Ingesting {
            connector: source.name.clone(),
            n: n as u64 + 1,
            total,
        });
    }

    let kept_active = library::deactivate_unseen(library_pool, version_label, &seen_paths).await?;

    index::upsert_source_version(
        index_pool,
        &SourceVersion {
            source_id: source.id.clone(),
            version_label: version_label.to_string(),
            git_ref: None,
            commit_sha: None,
            tree_hash: None,
            etag: None,
            synced_at: Utc::now(),
        },
    )
    .await?;

    Ok(IngestSummary {
        source_name: source.name.clone(),
        versions_synced: 1,
        documents_ingested: seen_paths.len() as u64,
        documents_kept_active: kept_active,
        pages_fetched: crawl_outcome.fetched.len() as u64,
        pages_failed: crawl_outcome.failed,
        error: None,
    })
}

/// Ingest every registered source with bounded concurrency, isolating
/// per-source failures (spec §4.5 step 4, §7 "never abort processing of
/// another").
#[allow(clippy::too_many_arguments)]
pub async fn ingest_all(
    store: &Store,
    config: &Config,
    client: &reqwest::Client,
    only_source: Option<&str>,
    force: bool,
    concurrency: usize,
    reporter: &dyn SyncProgressReporter,
) -> Result<Vec<IngestSummary>> {
    let sources = if let Some(name) = only_source {
        match index::get_source_by_name(&store.index_pool, name).await? {
            Some(source) => vec![source],
            None => anyhow::bail!("unknown source: {name}"),
        }
    } else {
        index::list_sources(&store.index_pool).await?
    };

    let mut summaries = Vec::with_capacity(sources.len());
    for batch in sources.chunks(concurrency.max(1)) {
        let tasks = batch
            .iter()
            .map(|source| ingest_source(store, config, client, source, force, reporter));
        let results = futures::future::join_all(tasks).await;
        for result in results {
            summaries.push(result?);
        }
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_version_label_is_stable() {
        assert_eq!(WEB_VERSION_LABEL, "latest");
    }
}
