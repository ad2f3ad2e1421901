//! Best-effort headless-browser fallback for sparse/SPA pages (spec §4.4
//! step 3 "Headless fallback").
//!
//! Disabled unless `headless.enabled` is set and a browser binary can be
//! located. Renders in an isolated temporary profile directory so the
//! crawler never touches the operator's real browser profile, and never
//! fails the page fetch — a missing binary or a render error just means the
//! plain HTML/Markdown extraction stands.

use crate::config::HeadlessConfig;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const CANDIDATE_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
];

/// Locate a usable browser binary: the configured path if set and present,
/// else the first candidate found on `PATH`.
pub fn resolve_browser_binary(config: &HeadlessConfig) -> Option<PathBuf> {
    if let Some(configured) = &config.chrome_path {
        let path = PathBuf::from(configured);
        if path.is_file() {
            return Some(path);
        }
        return None;
    }
    for name in CANDIDATE_BINARIES {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }
    None
}

fn which(binary: &str) -> Result<PathBuf, ()> {
    let path_var = std::env::var_os("PATH").ok_or(())?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(())
}

/// Render `url` in a headless browser and dump its DOM as HTML, returning
/// `None` on any failure (no binary, launch failure, timeout, bad output).
/// This is best-effort: callers must treat `None` as "keep the plain
/// extraction", never as a hard crawl error.
pub async fn render(config: &HeadlessConfig, url: &str, user_agent: &str) -> Option<String> {
    if !config.enabled {
        return None;
    }
    let binary = resolve_browser_binary(config)?;
    let profile_dir = tempfile::tempdir().ok()?;

    let mut command = Command::new(&binary);
    command
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--disable-extensions")
        .arg(format!("--user-data-dir={}", profile_dir.path().display()))
        .arg(format!("--user-agent={user_agent}"))
        .arg("--virtual-time-budget=4000")
        .arg("--dump-dom")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    if let Some(proxy) = &config.proxy {
        command.arg(format!("--proxy-server={proxy}"));
    }

    let timeout = Duration::from_secs(config.timeout);
    let output = tokio::time::timeout(timeout, command.output()).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let html = String::from_utf8(output.stdout).ok()?;
    if html.trim().is_empty() {
        None
    } else {
        Some(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_browser_binary_rejects_missing_configured_path() {
        let config = HeadlessConfig {
            enabled: true,
            chrome_path: Some("/no/such/binary".to_string()),
            proxy: None,
            timeout: 10,
        };
        assert!(resolve_browser_binary(&config).is_none());
    }

    #[tokio::test]
    async fn render_returns_none_when_disabled() {
        let config = HeadlessConfig {
            enabled: false,
            chrome_path: None,
            proxy: None,
            timeout: 10,
        };
        assert!(render(&config, "https://example.com", "ua").await.is_none());
    }
}
