//! Typed errors at module seams the orchestrator and CLI branch on.
//!
//! Top-level flows use `anyhow::Result` with `.context(...)`; these are for
//! callers that need to match on failure kind (spec §7).

use thiserror::Error;

/// Outcome of a GitHub archive sync attempt (spec §4.3 step 3).
#[derive(Debug, Error)]
pub enum GithubSyncError {
    #[error("not modified")]
    NotModified,
    #[error("token invalid or expired")]
    TokenInvalid,
    #[error("access denied or rate limited")]
    AccessDenied { rate_limited: bool },
    #[error("repository or ref not found")]
    NotFound,
    #[error("retryable failure: {0}")]
    Retryable(String),
    #[error("archive exceeded size limit")]
    TooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Store-level failures (spec §4.1, §7 "Integrity" row).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("migration {0} failed: {1}")]
    Migration(String, String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Matches spec §4.1's failure policy: a `short_read` or `disk I/O error`
    /// on DB open is recoverable by deleting and recreating the file.
    pub fn is_recoverable_open_error(&self) -> bool {
        let message = match self {
            StoreError::Sqlx(e) => e.to_string(),
            StoreError::Io(e) => e.to_string(),
            _ => return false,
        };
        message.contains("short_read") || message.contains("disk I/O error")
    }
}
