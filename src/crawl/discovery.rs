//! Seed discovery for a fresh web source (spec §4.4 "State", steps 1-3):
//! `llms.txt`/`llms-full.txt`, `robots.txt` sitemap directives, and
//! `sitemap.xml`, filtered to the root host/path.

use super::scope::{normalize_url, ScopeRules};
use std::time::Duration;
use url::Url;

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SITEMAP_DEPTH: usize = 3;
const MAX_URL_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub url: String,
}

async fn fetch_text(client: &reqwest::Client, url: &str, timeout: Duration) -> Option<String> {
    let response = client.get(url).timeout(timeout).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

/// Parse `llms.txt`-style list items: `- [title](url)` or bare `- url`,
/// resolved relative to `base`, kept when `<= 255` chars.
pub fn parse_llms_txt(content: &str, base: &Url) -> Vec<Discovered> {
    let mut out = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('-') else {
            continue;
        };
        let rest = rest.trim();

        let candidate = if let Some(open_paren) = rest.find('(') {
            if let Some(close_paren) = rest[open_paren..].find(')') {
                Some(rest[open_paren + 1..open_paren + close_paren].to_string())
            } else {
                None
            }
        } else if rest.starts_with("http://") || rest.starts_with("https://") {
            Some(rest.split_whitespace().next().unwrap_or(rest).to_string())
        } else {
            None
        };

        if let Some(candidate) = candidate {
            if candidate.len() > MAX_URL_LEN {
                continue;
            }
            if let Ok(resolved) = base.join(&candidate) {
                out.push(Discovered {
                    url: resolved.to_string(),
                });
            }
        }
    }
    out
}

/// Try `llms.txt`/`llms-full.txt` at the given root URL (spec §4.4 step 1).
pub async fn discover_llms_txt(client: &reqwest::Client, root_url: &Url) -> Vec<Discovered> {
    let mut out = Vec::new();
    for name in ["llms.txt", "llms-full.txt"] {
        let Ok(manifest_url) = root_url.join(name) else {
            continue;
        };
        if let Some(content) = fetch_text(client, manifest_url.as_str(), MANIFEST_TIMEOUT).await {
            out.extend(parse_llms_txt(&content, &manifest_url));
        }
    }
    out
}

fn extract_sitemap_directives(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("Sitemap:")
                .or_else(|| trimmed.strip_prefix("sitemap:"))
                .map(|rest| rest.trim().to_string())
        })
        .collect()
}

fn extract_locs(xml: &str) -> Vec<String> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = Vec::new();
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    out.push(text.into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    out
}

/// Resolve a sitemap (or sitemap index) URL into leaf `<loc>` entries,
/// following index entries breadth-first up to `MAX_SITEMAP_DEPTH` (spec
/// §4.4 step 2). Iterative rather than recursive: an async fn cannot
/// directly call itself without boxing its own future.
async fn resolve_sitemap(client: &reqwest::Client, root_sitemap_url: &str) -> Vec<String> {
    let mut frontier = vec![(root_sitemap_url.to_string(), 0usize)];
    let mut out = Vec::new();

    while let Some((sitemap_url, depth)) = frontier.pop() {
        if depth > MAX_SITEMAP_DEPTH {
            continue;
        }
        let Some(xml) = fetch_text(client, &sitemap_url, SITEMAP_TIMEOUT).await else {
            continue;
        };
        let locs = extract_locs(&xml);
        if xml.contains("<sitemapindex") {
            frontier.extend(locs.into_iter().map(|loc| (loc, depth + 1)));
        } else {
            out.extend(locs);
        }
    }
    out
}

/// Try `robots.txt` for `Sitemap:` entries, plus a bare `sitemap.xml` guess
/// (spec §4.4 step 2).
pub async fn discover_sitemap(client: &reqwest::Client, root_url: &Url) -> Vec<Discovered> {
    let mut sitemap_urls = Vec::new();

    if let Ok(robots_url) = root_url.join("/robots.txt") {
        if let Some(robots_txt) = fetch_text(client, robots_url.as_str(), MANIFEST_TIMEOUT).await {
            sitemap_urls.extend(extract_sitemap_directives(&robots_txt));
        }
    }
    if let Ok(guess) = root_url.join("/sitemap.xml") {
        sitemap_urls.push(guess.to_string());
    }

    let mut out = Vec::new();
    for sitemap_url in sitemap_urls {
        for loc in resolve_sitemap(client, &sitemap_url).await {
            out.push(Discovered { url: loc });
        }
    }
    out
}

/// Run full discovery (llms.txt + sitemap), filtered to the root host/path
/// scope (spec §4.4 step 3), deduplicated by normalized URL. Falls back to
/// the root URL itself (depth 0) when nothing is discovered.
pub async fn discover_seeds(
    client: &reqwest::Client,
    root_url: &str,
    allow_subdomains: bool,
) -> Vec<String> {
    let Ok(parsed_root) = Url::parse(root_url) else {
        return vec![root_url.to_string()];
    };
    let Some(root_host) = parsed_root.host_str().map(|h| h.to_lowercase()) else {
        return vec![root_url.to_string()];
    };
    let root_path = parsed_root.path().to_string();

    let mut candidates = discover_llms_txt(client, &parsed_root).await;
    candidates.extend(discover_sitemap(client, &parsed_root).await);

    let rules = ScopeRules {
        root_host: &root_host,
        root_path: &root_path,
        allow_subdomains,
        allowed_paths: &[],
        denied_paths: &[],
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        if let Some(normalized) = normalize_url(&candidate.url) {
            if super::scope::in_scope(&normalized, &rules) && seen.insert(normalized.clone()) {
                out.push(normalized);
            }
        }
    }

    if out.is_empty() {
        vec![root_url.to_string()]
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_llms_txt_list_items() {
        let base = Url::parse("https://hono.dev/").unwrap();
        let content = "# Hono\n\n- [Getting started](/docs/start)\n- /docs/guides\n";
        let out = parse_llms_txt(content, &base);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://hono.dev/docs/start");
    }

    #[test]
    fn extracts_sitemap_directives_from_robots_txt() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://hono.dev/sitemap.xml\n";
        let out = extract_sitemap_directives(robots);
        assert_eq!(out, vec!["https://hono.dev/sitemap.xml".to_string()]);
    }

    #[test]
    fn extracts_locs_from_sitemap_xml() {
        let xml = r#"<?xml version="1.0"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://hono.dev/docs/a</loc></url>
          <url><loc>https://hono.dev/docs/b</loc></url>
        </urlset>"#;
        let locs = extract_locs(xml);
        assert_eq!(locs, vec!["https://hono.dev/docs/a", "https://hono.dev/docs/b"]);
    }
}
