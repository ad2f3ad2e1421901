//! Bounded-concurrency crawl worker loop (spec §4.4 steps 1-6, §5
//! "Concurrency & Resource Model").

use super::extract::{
    extract_links, extract_main_content, fetch_html, is_sparse, looks_like_spa_shell,
    sanitize_markdown, try_fetch_markdown, user_agent_for,
};
use super::headless;
use super::scope::{in_scope, normalize_url, ScopeRules};
use crate::config::{CrawlConfig, HeadlessConfig};
use crate::models::CrawlPage;
use crate::store::library;
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use url::Url;

/// One fetched-and-extracted page, ready for the ingest orchestrator to
/// chunk and store.
pub struct CrawledDocument {
    pub path: String,
    pub uri: String,
    pub title: String,
    pub markdown: String,
}

fn path_from_url(url: &Url) -> String {
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        "index".to_string()
    } else {
        path.to_string()
    }
}

/// Fetch and extract a single page: Markdown negotiation first, then HTML
/// extraction, with a headless-browser retry when the HTML result looks
/// sparse or SPA-shell-like (spec §4.4 steps 1-4).
async fn fetch_one(
    client: &reqwest::Client,
    headless_config: &HeadlessConfig,
    page: &CrawlPage,
) -> Result<(CrawledDocument, Vec<String>)> {
    let url = Url::parse(&page.url)?;
    let user_agent = user_agent_for(page.id);

    if let Some(markdown) = try_fetch_markdown(client, &page.url, user_agent).await {
        let sanitized = sanitize_markdown(&markdown);
        let links = extract_links(&markdown, &url);
        let title = crate::chunk::title_from_content(&sanitized, &page.url);
        return Ok((
            CrawledDocument {
                path: path_from_url(&url),
                uri: page.url.clone(),
                title,
                markdown: sanitized,
            },
            links,
        ));
    }

    let fetched = fetch_html(client, &page.url, user_agent).await?;
    let mut html = fetched.body;
    let mut markdown = extract_main_content(&html);
    let mut links = extract_links(&html, &url);

    if headless_config.enabled && (is_sparse(&markdown, links.len()) || looks_like_spa_shell(&html))
    {
        if let Some(rendered) = headless::render(headless_config, &page.url, user_agent).await {
            html = rendered;
            markdown = extract_main_content(&html);
            links = extract_links(&html, &url);
        }
    }

    let sanitized = sanitize_markdown(&markdown);
    let title = crate::chunk::title_from_content(&sanitized, &page.url);
    Ok((
        CrawledDocument {
            path: path_from_url(&url),
            uri: page.url.clone(),
            title,
            markdown: sanitized,
        },
        links,
    ))
}

/// Seed the crawl queue for a fresh source from discovered seed URLs (spec
/// §4.4 "State"). Idempotent: existing rows are never replaced.
pub async fn seed_queue(pool: &SqlitePool, source_id: &str, seeds: &[String]) -> Result<()> {
    for seed in seeds {
        if let Some(normalized) = normalize_url(seed) {
            library::upsert_crawl_page(pool, source_id, seed, &normalized, 0).await?;
        }
    }
    Ok(())
}

pub struct CrawlOutcome {
    pub fetched: Vec<CrawledDocument>,
    pub failed: u64,
}

/// `true` when a fetched page's body is too thin to keep: shorter than
/// `min_body_chars`, or (when `require_code_snippets` is set) has no fenced
/// code block at all (spec §4.4 step 5).
fn fails_content_filter(markdown: &str, crawl_config: &CrawlConfig) -> Option<String> {
    if markdown.chars().count() < crawl_config.min_body_chars {
        return Some(format!(
            "body too short ({} chars < {})",
            markdown.chars().count(),
            crawl_config.min_body_chars
        ));
    }
    if crawl_config.require_code_snippets && !markdown.contains("```") {
        return Some("no code snippet found and require_code_snippets is set".to_string());
    }
    None
}

/// Drain the pending queue with a bounded worker pool, enqueuing newly
/// discovered in-scope links at `depth + 1` as pages are fetched (spec §4.4
/// step 6, §5 "Ordering"/"Resumability"). Stops claiming new pages once
/// `max_pages` pages have been fetched or marked done/failed this run.
#[allow(clippy::too_many_arguments)]
pub async fn run_crawl(
    pool: &SqlitePool,
    client: &reqwest::Client,
    source_id: &str,
    root_host: &str,
    root_path: &str,
    allow_subdomains: bool,
    allowed_paths: &[String],
    denied_paths: &[String],
    crawl_config: &CrawlConfig,
    headless_config: &HeadlessConfig,
    max_depth: i64,
    max_pages: i64,
) -> Result<CrawlOutcome> {
    let rules = ScopeRules {
        root_host,
        root_path,
        allow_subdomains,
        allowed_paths,
        denied_paths,
    };

    let pool = Arc::new(pool.clone());
    let client = Arc::new(client.clone());
    let mut fetched = Vec::new();
    let mut failed = 0u64;
    let mut processed = 0i64;

    loop {
        if max_pages > 0 && processed >= max_pages {
            break;
        }

        let mut batch = Vec::new();
        let remaining = if max_pages > 0 {
            (max_pages - processed).max(0) as usize
        } else {
            crawl_config.concurrency
        };
        for _ in 0..crawl_config.concurrency.min(remaining.max(1)) {
            match library::claim_next_page(&pool, source_id).await? {
                Some(page) => batch.push(page),
                None => break,
            }
            if max_pages > 0 && processed as usize + batch.len() >= max_pages as usize {
                break;
            }
        }
        if batch.is_empty() {
            break;
        }

        let tasks = batch.into_iter().map(|page| {
            let pool = Arc::clone(&pool);
            let client = Arc::clone(&client);
            let headless_config = headless_config.clone();
            async move {
                let result = fetch_one(&client, &headless_config, &page).await;
                (page, result)
            }
        });

        let results = futures::future::join_all(tasks).await;
        for (page, result) in results {
            processed += 1;
            match result {
                Ok((document, links)) => {
                    if let Some(reason) = fails_content_filter(&document.markdown, crawl_config) {
                        library::mark_page_failed(&pool, page.id, &reason).await?;
                        failed += 1;
                        continue;
                    }

                    if page.depth < max_depth {
                        for link in links {
                            if let Some(normalized) = normalize_url(&link) {
                                if in_scope(&normalized, &rules) {
                                    library::upsert_crawl_page(
                                        &pool,
                                        source_id,
                                        &link,
                                        &normalized,
                                        page.depth + 1,
                                    )
                                    .await?;
                                }
                            }
                        }
                    }
                    library::mark_page_done(&pool, page.id).await?;
                    fetched.push(document);
                }
                Err(e) => {
                    library::mark_page_failed(&pool, page.id, &e.to_string()).await?;
                    failed += 1;
                }
            }
        }
    }

    Ok(CrawlOutcome { fetched, failed })
}

#[cfg(test)]
mod content_filter_tests {
    use super::*;

    fn config(min_body_chars: usize, require_code_snippets: bool) -> CrawlConfig {
        CrawlConfig {
            concurrency: 5,
            min_body_chars,
            require_code_snippets,
        }
    }

    #[test]
    fn rejects_body_shorter_than_minimum() {
        let cfg = config(200, false);
        assert!(fails_content_filter("too short", &cfg).is_some());
        assert!(fails_content_filter(&"word ".repeat(100), &cfg).is_none());
    }

    #[test]
    fn rejects_missing_code_snippet_when_required() {
        let cfg = config(10, true);
        assert!(fails_content_filter(&"word ".repeat(10), &cfg).is_some());
        assert!(fails_content_filter("```rust\nfn main() {}\n```", &cfg).is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_from_url_strips_leading_slash_and_defaults_to_index() {
        let root = Url::parse("https://hono.dev/").unwrap();
        assert_eq!(path_from_url(&root), "index");
        let page = Url::parse("https://hono.dev/docs/guides").unwrap();
        assert_eq!(path_from_url(&page), "docs/guides");
    }
}
