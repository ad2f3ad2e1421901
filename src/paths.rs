//! Config/cache directory resolution (spec §6, "Filesystem").
//!
//! Default locations are per-OS user config/cache dirs via the `dirs` crate;
//! every default is overridable by an environment variable.

use std::path::PathBuf;

const ENV_CONFIG_DIR: &str = "DOCVAULT_CONFIG_DIR";
const ENV_CACHE_DIR: &str = "DOCVAULT_CACHE_DIR";
const ENV_DB_PATH: &str = "DOCVAULT_DB_PATH";
const ENV_LIBRARY_DB_DIR: &str = "DOCVAULT_LIBRARY_DB_DIR";

/// Directory holding `config.yml`.
pub fn config_dir() -> PathBuf {
    if let Ok(v) = std::env::var(ENV_CONFIG_DIR) {
        return PathBuf::from(v);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docvault")
}

/// Path to the YAML config file.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yml")
}

/// Directory holding the index DB, the per-library DB directory, and the
/// `models/` folder for downloaded embedding and expansion models.
pub fn cache_dir() -> PathBuf {
    if let Ok(v) = std::env::var(ENV_CACHE_DIR) {
        return PathBuf::from(v);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docvault")
}

/// Path to the global index DB file.
pub fn index_db_path() -> PathBuf {
    if let Ok(v) = std::env::var(ENV_DB_PATH) {
        return PathBuf::from(v);
    }
    cache_dir().join("index.sqlite3")
}

/// Directory holding one SQLite file per library.
pub fn library_db_dir() -> PathBuf {
    if let Ok(v) = std::env::var(ENV_LIBRARY_DB_DIR) {
        return PathBuf::from(v);
    }
    cache_dir().join("db")
}

/// Directory for downloaded embedding/expansion models. Nothing in this crate
/// downloads models (spec's Non-goals exclude "model-download plumbing"); the
/// path is still resolved so an external collaborator can populate it.
pub fn models_dir() -> PathBuf {
    cache_dir().join("models")
}

/// Derive a stable library DB filename from a source's identity, so renames
/// of the display name don't orphan the file. Uses owner/repo when present,
/// else the source's own id (stable across its lifetime).
pub fn library_db_path(owner_repo: Option<(&str, &str)>, source_id: &str) -> PathBuf {
    let stem = match owner_repo {
        Some((owner, repo)) => format!("{owner}__{repo}"),
        None => source_id.to_string(),
    };
    library_db_dir().join(format!("{stem}.sqlite3"))
}

/// Ensure the config, cache, library-db, and models directories exist.
pub fn ensure_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(cache_dir())?;
    std::fs::create_dir_all(library_db_dir())?;
    std::fs::create_dir_all(models_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        std::env::set_var(ENV_CACHE_DIR, "/tmp/docvault-test-cache");
        assert_eq!(cache_dir(), PathBuf::from("/tmp/docvault-test-cache"));
        std::env::remove_var(ENV_CACHE_DIR);
    }

    #[test]
    fn library_db_path_prefers_owner_repo() {
        std::env::set_var(ENV_LIBRARY_DB_DIR, "/tmp/docvault-test-libs");
        let path = library_db_path(Some(("honojs", "website")), "src_123");
        assert_eq!(
            path,
            PathBuf::from("/tmp/docvault-test-libs/honojs__website.sqlite3")
        );
        std::env::remove_var(ENV_LIBRARY_DB_DIR);
    }
}
