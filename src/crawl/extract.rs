//! Page content extraction and sanitization (spec §4.4 steps 1-5).
//!
//! Negotiates Markdown first, falls back to HTML with a readability-style
//! pass, and sanitizes the resulting Markdown before it reaches the chunker.

use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const SPARSE_BODY_CHARS: usize = 400;
const SPARSE_LINK_COUNT: usize = 3;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
];

/// Rotate among a short list of realistic user agents (spec §6 "Network
/// behavior"), keyed off a page id so repeated fetches of the same page are
/// stable across retries.
pub fn user_agent_for(seed: i64) -> &'static str {
    USER_AGENTS[(seed.unsigned_abs() as usize) % USER_AGENTS.len()]
}

pub struct FetchedPage {
    pub content_type: Option<String>,
    pub body: String,
}

fn looks_like_markdown(content_type: Option<&str>, body: &str) -> bool {
    if let Some(ct) = content_type {
        if ct.contains("markdown") {
            return true;
        }
        if ct.contains("text/plain") {
            let head: String = body.chars().take(500).collect();
            return head.contains("# ") || head.contains("```");
        }
    }
    false
}

/// Step 1: request with `Accept: text/markdown,...`; return the body if the
/// server actually served Markdown (or markdown-looking plain text).
pub async fn try_fetch_markdown(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Option<String> {
    let response = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .header("Accept", "text/markdown, text/plain;q=0.9, */*;q=0.1")
        .header("User-Agent", user_agent)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = response.text().await.ok()?;
    if looks_like_markdown(content_type.as_deref(), &body) {
        Some(body)
    } else {
        None
    }
}

/// Step 2: request with `Accept: text/html,...`.
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Result<FetchedPage, anyhow::Error> {
    let response = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
        .header("User-Agent", user_agent)
        .send()
        .await?;
    anyhow::ensure!(response.status().is_success(), "status {}", response.status());
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = response.text().await?;
    Ok(FetchedPage {
        content_type,
        body,
    })
}

const STRIP_SELECTORS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "iframe",
];

const MAIN_CONTENT_SELECTORS: &[&str] =
    &["main", "article", "[role=main]", "#content", ".content", ".markdown-body", "body"];

/// Readability-style extraction: pick the first matching main-content
/// container, strip nav/header/footer/script/style, convert to Markdown with
/// fenced code blocks (language detected from a `language-*` class) (spec
/// §4.4 step 2).
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut container_html: Option<String> = None;
    for selector_str in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                container_html = Some(el.html());
                break;
            }
        }
    }
    let container_html = container_html.unwrap_or_else(|| html.to_string());

    let mut fragment = Html::parse_fragment(&container_html);
    for selector_str in STRIP_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            let ids: Vec<_> = fragment.select(&selector).map(|e| e.id()).collect();
            for id in ids {
                fragment.tree.get_mut(id).map(|mut n| n.detach());
            }
        }
    }

    html_to_markdown(&fragment.html())
}

/// Convert sanitized HTML to Markdown with fenced code blocks, detecting
/// language from a `class="language-xyz"` attribute on `<code>` (spec §4.4
/// step 2).
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_fragment(html);
    let code_selector = Selector::parse("pre code[class*=language-]").unwrap();
    let mut rewritten = html.to_string();

    for code_block in document.select(&code_selector) {
        if let Some(class) = code_block.value().attr("class") {
            if let Some(lang) = class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
            {
                let text: String = code_block.text().collect();
                let fenced = format!("\n\n```{lang}\n{}\n```\n\n", text.trim_end());
                let original = code_block.html();
                rewritten = rewritten.replacen(&original, &fenced, 1);
            }
        }
    }

    html2text::from_read(rewritten.as_bytes(), 100).unwrap_or_default()
}

/// A page is "sparse" when its body is short or it has few outgoing links
/// (spec §4.4 step 3, GLOSSARY "Sparse page").
pub fn is_sparse(body: &str, link_count: usize) -> bool {
    body.chars().count() < SPARSE_BODY_CHARS || link_count < SPARSE_LINK_COUNT
}

const SPA_INDICATORS: &[&str] = &["id=\"root\"", "id=\"__next\"", "ng-app", "data-reactroot"];

pub fn looks_like_spa_shell(html: &str) -> bool {
    SPA_INDICATORS.iter().any(|marker| html.contains(marker))
}

/// Extract both HTML `<a href>` and Markdown `[text](url)` links, resolved
/// against `base` (spec §4.4 step 6).
pub fn extract_links(html_or_markdown: &str, base: &Url) -> Vec<String> {
    let mut out = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        let document = Html::parse_fragment(html_or_markdown);
        for el in document.select(&selector) {
            if let Some(href) = el.value().attr("href") {
                if let Ok(resolved) = base.join(href) {
                    out.push(resolved.to_string());
                }
            }
        }
    }

    let md_link = regex::Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").unwrap();
    for cap in md_link.captures_iter(html_or_markdown) {
        if let Ok(resolved) = base.join(&cap[1]) {
            out.push(resolved.to_string());
        }
    }

    out
}

/// Sanitize extracted Markdown (spec §4.4 step 4): drop TOC blocks and
/// anchor-only link lists, collapse blank-line runs, normalize setext
/// headings (`===`/`---` underlines) to ATX, unescape underscores inside
/// fenced code, and fix common mojibake.
pub fn sanitize_markdown(markdown: &str) -> String {
    let normalized = normalize_setext_headings(markdown);
    let lines: Vec<&str> = normalized.lines().collect();

    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    let mut in_code_fence = false;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_fence = !in_code_fence;
            out.push(line.to_string());
            blank_run = 0;
            i += 1;
            continue;
        }
        if in_code_fence {
            out.push(unescape_underscores(line));
            i += 1;
            continue;
        }

        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                out.push(String::new());
            }
            i += 1;
            continue;
        }
        blank_run = 0;

        if is_toc_heading(trimmed) {
            i += 1;
            while i < lines.len() && (lines[i].trim().is_empty() || is_list_item(lines[i].trim())) {
                i += 1;
            }
            continue;
        }
        if is_anchor_only_list_item(trimmed) {
            i += 1;
            continue;
        }

        out.push(fix_mojibake(line));
        i += 1;
    }

    out.join("\n").trim().to_string()
}

fn normalize_setext_headings(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if i + 1 < lines.len() && !line.trim().is_empty() {
            let next = lines[i + 1].trim();
            if !next.is_empty() && next.chars().all(|c| c == '=') {
                out.push(format!("# {}", line.trim()));
                i += 2;
                continue;
            }
            if !next.is_empty() && next.chars().all(|c| c == '-') && next.len() >= 2 {
                out.push(format!("## {}", line.trim()));
                i += 2;
                continue;
            }
        }
        out.push(line.to_string());
        i += 1;
    }
    out.join("\n")
}

fn is_toc_heading(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("## table of contents")
        || lower.starts_with("# table of contents")
        || lower == "## contents"
}

fn is_list_item(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('*') || line.starts_with(|c: char| c.is_ascii_digit())
}

/// A bullet whose only content is a bare in-page anchor link, e.g.
/// `- [Introduction](#introduction)`.
fn is_anchor_only_list_item(line: &str) -> bool {
    if !is_list_item(line) {
        return false;
    }
    let re = regex::Regex::new(r"^[-*]\s*\[[^\]]*\]\(#[^)]*\)\s*$").unwrap();
    re.is_match(line)
}

fn unescape_underscores(line: &str) -> String {
    line.replace("\\_", "_")
}

fn fix_mojibake(line: &str) -> String {
    line.replace('\u{00e2}', "")
        .replace("\u{2019}", "'")
        .replace("\u{201c}", "\"")
        .replace("\u{201d}", "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_sparse_detects_short_body_or_few_links() {
        assert!(is_sparse("short", 10));
        assert!(is_sparse(&"word ".repeat(200), 1));
        assert!(!is_sparse(&"word ".repeat(200), 5));
    }

    #[test]
    fn extract_main_content_strips_nav_and_converts_code_fence() {
        let html = r#"<html><body>
            <nav>skip me</nav>
            <main><p>Hello</p><pre><code class="language-rust">fn main() {}</code></pre></main>
            <footer>skip me too</footer>
        </body></html>"#;
        let md = extract_main_content(html);
        assert!(!md.contains("skip me"));
        assert!(md.contains("```rust") || md.contains("fn main"));
    }

    #[test]
    fn sanitize_drops_toc_and_anchor_only_items() {
        let md = "## Table of Contents\n\n- [Intro](#intro)\n- [Usage](#usage)\n\n## Intro\n\nBody text.\n";
        let out = sanitize_markdown(md);
        assert!(!out.to_lowercase().contains("table of contents"));
        assert!(out.contains("Body text."));
    }

    #[test]
    fn sanitize_normalizes_setext_headings() {
        let md = "Title\n=====\n\nbody\n";
        let out = sanitize_markdown(md);
        assert!(out.starts_with("# Title"));
    }

    #[test]
    fn sanitize_collapses_multiple_blank_lines() {
        let md = "a\n\n\n\n\nb\n";
        let out = sanitize_markdown(md);
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn extract_links_resolves_html_and_markdown_links() {
        let base = Url::parse("https://hono.dev/docs/").unwrap();
        let body = r#"<a href="/docs/guides">Guides</a> and [API](./api)"#;
        let links = extract_links(body, &base);
        assert!(links.iter().any(|l| l == "https://hono.dev/docs/guides"));
        assert!(links.iter().any(|l| l == "https://hono.dev/docs/api"));
    }
}
