//! GitHub archive download, unzip, and extraction (spec §4.3 "Protocol").

use crate::errors::GithubSyncError;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SIZE_LIMIT: u64 = 500 * 1024 * 1024;
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the ordered candidate list of zipball URLs (spec §4.3 step 1).
pub fn candidate_urls(owner: &str, repo: &str, git_ref: &str) -> Vec<String> {
    let mut urls = vec![format!(
        "https://api.github.com/repos/{owner}/{repo}/zipball/{git_ref}"
    )];

    let looks_like_sha = git_ref.len() >= 7 && git_ref.chars().all(|c| c.is_ascii_hexdigit());
    if looks_like_sha {
        urls.push(format!(
            "https://github.com/{owner}/{repo}/archive/{git_ref}.zip"
        ));
    }
    urls.push(format!(
        "https://github.com/{owner}/{repo}/archive/refs/heads/{git_ref}.zip"
    ));
    urls.push(format!(
        "https://github.com/{owner}/{repo}/archive/refs/tags/{git_ref}.zip"
    ));
    if git_ref != "HEAD" {
        urls.push(format!(
            "https://github.com/{owner}/{repo}/archive/refs/heads/HEAD.zip"
        ));
    }
    urls
}

pub enum DownloadOutcome {
    NotModified,
    Ok {
        bytes: Vec<u8>,
        etag: Option<String>,
        resolved_url: String,
        commit_sha_header: Option<String>,
    },
}

fn interpret_status(status: reqwest::StatusCode, rate_limit_remaining: Option<&str>) -> Option<GithubSyncError> {
    match status.as_u16() {
        304 => Some(GithubSyncError::NotModified),
        401 => Some(GithubSyncError::TokenInvalid),
        403 => Some(GithubSyncError::AccessDenied {
            rate_limited: rate_limit_remaining == Some("0"),
        }),
        404 => Some(GithubSyncError::NotFound),
        429 | 500..=599 => Some(GithubSyncError::Retryable(format!("status {status}"))),
        200..=299 => None,
        other => Some(GithubSyncError::Retryable(format!("unexpected status {other}"))),
    }
}

/// Try each candidate URL in order until one succeeds, is not-modified, or
/// the list is exhausted (spec §4.3 steps 2-4).
pub async fn download(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    git_ref: &str,
    token: Option<&str>,
    prev_etag: Option<&str>,
    size_limit: u64,
) -> Result<DownloadOutcome, GithubSyncError> {
    let mut last_err: Option<GithubSyncError> = None;

    for (attempt, url) in candidate_urls(owner, repo, git_ref).into_iter().enumerate() {
        if attempt > 0 && matches!(last_err, Some(GithubSyncError::Retryable(_))) {
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        let mut request = client.get(&url).timeout(ARCHIVE_TIMEOUT);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(etag) = prev_etag {
            request = request.header("If-None-Match", etag);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                last_err = Some(GithubSyncError::Retryable(e.to_string()));
                continue;
            }
        };

        let rate_remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(err) = interpret_status(response.status(), rate_remaining.as_deref()) {
            match err {
                GithubSyncError::NotModified => return Ok(DownloadOutcome::NotModified),
                GithubSyncError::NotFound | GithubSyncError::TokenInvalid => {
                    last_err = Some(err);
                    continue;
                }
                other => {
                    last_err = Some(other);
                    continue;
                }
            }
        }

        if let Some(len) = response.content_length() {
            if len > size_limit {
                return Err(GithubSyncError::TooLarge);
            }
        }

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let commit_sha_header = response
            .headers()
            .get("x-resolved-commit-sha")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let resolved_url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GithubSyncError::Retryable(e.to_string()))?;
        if bytes.len() as u64 > size_limit {
            return Err(GithubSyncError::TooLarge);
        }

        return Ok(DownloadOutcome::Ok {
            bytes: bytes.to_vec(),
            etag,
            resolved_url,
            commit_sha_header,
        });
    }

    Err(last_err.unwrap_or(GithubSyncError::Retryable("no candidate URLs succeeded".into())))
}

fn hex_tail(s: &str) -> Option<String> {
    let candidate: String = s
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if candidate.len() >= 7 {
        Some(candidate)
    } else {
        None
    }
}

/// Recover the commit SHA in the documented order: response header, trailing
/// hex in the top-level dir name, hex in the URL tail, previously known SHA
/// (spec §4.3 step 6).
pub fn recover_commit_sha(
    commit_sha_header: Option<&str>,
    top_level_dir: &str,
    resolved_url: &str,
    previous_sha: Option<&str>,
) -> Option<String> {
    commit_sha_header
        .map(|s| s.to_string())
        .or_else(|| hex_tail(top_level_dir))
        .or_else(|| hex_tail(resolved_url))
        .or_else(|| previous_sha.map(|s| s.to_string()))
}

#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub abs: PathBuf,
    pub rel: String,
}

fn sanitize_rel_path(path: &str) -> Option<String> {
    if path.starts_with('/') || path.contains("..") {
        return None;
    }
    Some(path.to_string())
}

/// Unzip `bytes` into `dest_dir`, stripping a single common top-level
/// directory if present, sanitizing entry paths, and skipping symlinks
/// (spec §4.3 step 5). Returns the stripped top-level dir name (for commit
/// SHA recovery) and the kept, sorted files.
pub fn extract(
    bytes: &[u8],
    base_path: Option<&str>,
    dest_dir: &Path,
) -> Result<(String, Vec<ExtractedFile>), GithubSyncError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;

    let mut common_prefix: Option<String> = None;
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;
        let name = file.name().to_string();
        let top = name.split('/').next().unwrap_or("").to_string();
        match &common_prefix {
            None => common_prefix = Some(top),
            Some(existing) if existing != &top => common_prefix = Some(String::new()),
            _ => {}
        }
    }
    let top_level_dir = common_prefix.unwrap_or_default();

    std::fs::create_dir_all(dest_dir).map_err(GithubSyncError::Io)?;
    let mut files = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| GithubSyncError::Io(std::io::Error::other(e)))?;
        if entry.is_dir() {
            continue;
        }
        if entry.unix_mode().map(|m| m & 0o170000 == 0o120000).unwrap_or(false) {
            continue; // symlink
        }

        let raw_name = entry.name().to_string();
        let stripped = if !top_level_dir.is_empty() {
            raw_name
                .strip_prefix(&format!("{top_level_dir}/"))
                .unwrap_or(&raw_name)
                .to_string()
        } else {
            raw_name
        };

        let Some(rel) = sanitize_rel_path(&stripped) else {
            continue;
        };
        if let Some(base) = base_path {
            if !rel.starts_with(base) {
                continue;
            }
        }

        let abs = dest_dir.join(&rel);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).map_err(GithubSyncError::Io)?;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(GithubSyncError::Io)?;
        std::fs::write(&abs, &content).map_err(GithubSyncError::Io)?;

        files.push(ExtractedFile { abs, rel });
    }

    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok((top_level_dir, files))
}

pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_urls_in_documented_order() {
        let urls = candidate_urls("honojs", "website", "main");
        assert_eq!(
            urls[0],
            "https://api.github.com/repos/honojs/website/zipball/main"
        );
        assert!(urls.iter().any(|u| u.contains("refs/heads/main")));
    }

    #[test]
    fn sha_candidate_adds_commit_archive_url() {
        let urls = candidate_urls("o", "r", "abcdef1234567890abcdef1234567890abcdef12");
        assert!(urls.iter().any(|u| u.ends_with(".zip") && u.contains("/archive/abcdef1234567890abcdef1234567890abcdef12.zip")));
    }

    #[test]
    fn recovers_sha_from_header_first() {
        let sha = recover_commit_sha(Some("deadbeef"), "repo-1234567", "https://x/abc1234", Some("old"));
        assert_eq!(sha.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn recovers_sha_from_dirname_when_header_absent() {
        let sha = recover_commit_sha(None, "website-1a2b3c4", "https://x/y", None);
        assert_eq!(sha.as_deref(), Some("1a2b3c4"));
    }

    #[test]
    fn sanitizes_absolute_and_traversal_paths() {
        assert!(sanitize_rel_path("docs/a.md").is_some());
        assert!(sanitize_rel_path("/etc/passwd").is_none());
        assert!(sanitize_rel_path("../../etc/passwd").is_none());
    }
}
