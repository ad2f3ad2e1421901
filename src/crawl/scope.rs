//! URL normalization and scope rules for the web crawler (spec §4.4 "Scope
//! rules"). Normalization must be idempotent: `normalize(normalize(x)) ==
//! normalize(x)` (spec §8 round-trip property).

use url::Url;

/// Normalize a URL: lowercase host, collapse `//`, strip a trailing slash,
/// strip a trailing `.md`, keep scheme and query.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    url.set_host(Some(&host)).ok()?;
    // url crate lowercases scheme already; fragments play no role in identity.
    url.set_fragment(None);

    let mut path = url.path().to_string();
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if let Some(stripped) = path.strip_suffix(".md") {
        path = stripped.to_string();
    }
    if path.is_empty() {
        path = "/".to_string();
    }
    url.set_path(&path);

    Some(url.to_string())
}

/// Scope configuration a candidate URL is checked against (spec §4.4).
pub struct ScopeRules<'a> {
    pub root_host: &'a str,
    pub root_path: &'a str,
    pub allow_subdomains: bool,
    pub allowed_paths: &'a [String],
    pub denied_paths: &'a [String],
}

/// `true` iff `candidate` is http(s), same host (or allowed subdomain), has a
/// path under `root_path`/any of `allowed_paths` (if set), and matches no
/// `denied_paths` entry (spec §4.4 "Scope rules").
pub fn in_scope(candidate: &str, rules: &ScopeRules) -> bool {
    let Some(normalized) = normalize_url(candidate) else {
        return false;
    };
    let Ok(url) = Url::parse(&normalized) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    let host_matches = host == rules.root_host
        || (rules.allow_subdomains && host.ends_with(&format!(".{}", rules.root_host)));
    if !host_matches {
        return false;
    }

    let path = url.path();
    if !rules.root_path.is_empty() && rules.root_path != "/" && !path.starts_with(rules.root_path)
    {
        return false;
    }

    if !rules.allowed_paths.is_empty() && !rules.allowed_paths.iter().any(|p| path.starts_with(p.as_str()))
    {
        return false;
    }

    if rules.denied_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let cases = [
            "https://Hono.dev/docs/guides/",
            "https://hono.dev//docs//guides.md",
            "https://hono.dev/docs/guides#section",
        ];
        for c in cases {
            let once = normalize_url(c).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_lowercases_host_and_strips_trailing_slash_and_md() {
        assert_eq!(
            normalize_url("https://Hono.DEV/docs/guides/").unwrap(),
            "https://hono.dev/docs/guides"
        );
        assert_eq!(
            normalize_url("https://hono.dev/docs/guides.md").unwrap(),
            "https://hono.dev/docs/guides"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(normalize_url("ftp://example.com/a").is_none());
        assert!(normalize_url("mailto:a@example.com").is_none());
    }

    #[test]
    fn in_scope_enforces_host_root_path_and_denylist() {
        let rules = ScopeRules {
            root_host: "hono.dev",
            root_path: "/docs",
            allow_subdomains: false,
            allowed_paths: &[],
            denied_paths: &["/docs/internal".to_string()],
        };
        assert!(in_scope("https://hono.dev/docs/guides", &rules));
        assert!(!in_scope("https://other.dev/docs/guides", &rules));
        assert!(!in_scope("https://hono.dev/blog", &rules));
        assert!(!in_scope("https://hono.dev/docs/internal/x", &rules));
    }

    #[test]
    fn in_scope_allows_subdomains_when_enabled() {
        let rules = ScopeRules {
            root_host: "hono.dev",
            root_path: "",
            allow_subdomains: true,
            allowed_paths: &[],
            denied_paths: &[],
        };
        assert!(in_scope("https://docs.hono.dev/guides", &rules));
    }
}
