//! Web crawler (spec §4.4): seed discovery, scope rules, bounded-concurrency
//! fetch loop with Markdown negotiation and headless fallback.

pub mod discovery;
pub mod extract;
pub mod fetch;
pub mod headless;
pub mod scope;

use crate::config::{CrawlConfig, HeadlessConfig};
use crate::store::library;
use anyhow::Result;
use fetch::CrawlOutcome;
use sqlx::SqlitePool;
use url::Url;

pub const DEFAULT_MAX_DEPTH: i64 = 5;
/// `0` means "unbounded" (spec §3 `Source.max_pages` is optional).
pub const DEFAULT_MAX_PAGES: i64 = 0;

/// Crawl a Web-kind source end to end: seed the queue on first ingest (or
/// resume an in-progress one), then drain it with a bounded worker pool
/// (spec §4.4 "State", "Resumability"). `force` clears any existing queue and
/// repeats discovery (spec §4.4 "Resumability": "`done` pages are not
/// refetched unless `--force` is passed, in which case the queue is cleared
/// and discovery repeats").
#[allow(clippy::too_many_arguments)]
pub async fn crawl_source(
    pool: &SqlitePool,
    client: &reqwest::Client,
    source_id: &str,
    root_url: &str,
    allow_subdomains: bool,
    allowed_paths: &[String],
    denied_paths: &[String],
    max_depth: Option<i64>,
    max_pages: Option<i64>,
    force: bool,
    crawl_config: &CrawlConfig,
    headless_config: &HeadlessConfig,
) -> Result<CrawlOutcome> {
    if force {
        library::clear_crawl_queue(pool, source_id).await?;
    }

    if !library::has_any_crawl_pages(pool, source_id).await? {
        let seeds = discovery::discover_seeds(client, root_url, allow_subdomains).await;
        fetch::seed_queue(pool, source_id, &seeds).await?;
    } else {
        library::requeue_failed_pages(pool, source_id).await?;
    }

    let parsed_root = Url::parse(root_url)?;
    let root_host = parsed_root
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("web source root URL has no host: {root_url}"))?
        .to_lowercase();
    let root_path = parsed_root.path().to_string();

    fetch::run_crawl(
        pool,
        client,
        source_id,
        &root_host,
        &root_path,
        allow_subdomains,
        allowed_paths,
        denied_paths,
        crawl_config,
        headless_config,
        max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        max_pages.unwrap_or(DEFAULT_MAX_PAGES),
    )
    .await
}
