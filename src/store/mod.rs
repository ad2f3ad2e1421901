//! The Store: a global index DB (sources, source_versions) plus one library
//! DB per source (documents, chunks, vectors, crawl queue).
//!
//! Mirrors the teacher's `db.rs` connection pattern (WAL, `create_if_missing`,
//! bounded pool) but splits it into two connection kinds, and adds the
//! open-time failure policy from spec §4.1/§7: a recoverable I/O error on
//! open deletes the file(s) and recreates them via migrations.

pub mod index;
pub mod library;
pub mod migrations;

use crate::errors::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;

async fn open_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

fn is_recoverable_open_error(err: &sqlx::Error) -> bool {
    let message = err.to_string();
    message.contains("short_read") || message.contains("disk I/O error")
}

/// Open (creating if needed) a database at `path`, running `migrate` on it.
/// On a recoverable open/migrate error, delete the file and its WAL/SHM
/// siblings and retry once with a fresh file (spec §4.1 failure policy).
async fn open_with_failure_policy<F, Fut>(
    path: &Path,
    migrate: F,
) -> Result<SqlitePool, StoreError>
where
    F: Fn(SqlitePool) -> Fut,
    Fut: std::future::Future<Output = Result<SqlitePool, sqlx::Error>>,
{
    match open_pool(path).await {
        Ok(pool) => match migrate(pool).await {
            Ok(pool) => return Ok(pool),
            Err(e) if is_recoverable_open_error(&e) => {
                tracing::warn!(path = %path.display(), error = %e, "recoverable integrity error, recreating database");
            }
            Err(e) => return Err(e.into()),
        },
        Err(e) if is_recoverable_open_error(&e) => {
            tracing::warn!(path = %path.display(), error = %e, "recoverable open error, recreating database");
        }
        Err(e) => return Err(e.into()),
    }

    delete_db_files(path);
    let pool = open_pool(path).await?;
    let pool = migrate(pool).await?;
    Ok(pool)
}

fn delete_db_files(path: &Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("sqlite3-wal"));
    let _ = std::fs::remove_file(path.with_extension("sqlite3-shm"));
}

/// Open the global index DB, running its migrations.
pub async fn open_index(path: &Path) -> Result<SqlitePool, StoreError> {
    open_with_failure_policy(path, |pool| async move {
        migrations::run_index_migrations(&pool).await?;
        Ok(pool)
    })
    .await
}

/// Open a per-source library DB, running its migrations.
pub async fn open_library(path: &Path) -> Result<SqlitePool, StoreError> {
    open_with_failure_policy(path, |pool| async move {
        migrations::run_library_migrations(&pool).await?;
        Ok(pool)
    })
    .await
}

/// Delete and recreate the index DB (spec §11 `reset`).
pub async fn reset_index(path: &Path) -> Result<SqlitePool, StoreError> {
    delete_db_files(path);
    open_index(path).await
}

/// Delete and recreate a single library DB (spec §11 `reset <source>`).
pub async fn reset_library(path: &Path) -> Result<SqlitePool, StoreError> {
    delete_db_files(path);
    open_library(path).await
}

/// Owns both database scopes for one process invocation.
pub struct Store {
    pub index_pool: SqlitePool,
    index_db_path: PathBuf,
    library_db_dir: PathBuf,
}

impl Store {
    pub async fn open(index_db_path: PathBuf, library_db_dir: PathBuf) -> Result<Self, StoreError> {
        let index_pool = open_index(&index_db_path).await?;
        Ok(Self {
            index_pool,
            index_db_path,
            library_db_dir,
        })
    }

    pub fn index_db_path(&self) -> &Path {
        &self.index_db_path
    }

    pub fn library_db_dir(&self) -> &Path {
        &self.library_db_dir
    }

    /// Open (and migrate) a library DB by its absolute path.
    pub async fn open_library(&self, library_db_path: &Path) -> Result<SqlitePool, StoreError> {
        open_library(library_db_path).await
    }

    pub async fn close(self) {
        self.index_pool.close().await;
    }
}
