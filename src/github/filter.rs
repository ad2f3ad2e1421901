//! Path and file filtering for extracted archive entries (spec §4.3
//! "Filter").

const HIDDEN_SEGMENTS: &[&str] = &[
    ".git",
    ".github",
    ".cache",
    "node_modules",
    "dist",
    "build",
    "target",
    ".venv",
    "__pycache__",
];

const LOCKFILE_BASENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "composer.lock",
    "Pipfile.lock",
];

const BINARY_MEDIA_ARCHIVE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "woff", "woff2", "ttf", "eot",
    "mp3", "mp4", "mov", "avi", "wav", "ogg", "zip", "tar", "gz", "bz2", "7z", "rar", "jar",
    "war", "exe", "dll", "so", "dylib", "bin", "pdf", "wasm", "class",
];

const BAD_SUFFIXES: &[&str] = &[".min.js", ".bundle.css", ".log", ".bak", "~"];

const SPECIAL_NAME_FILES: &[&str] = &["Dockerfile", "Makefile", "Rakefile", "Gemfile"];

fn has_hidden_segment(path: &str) -> bool {
    path.split('/').any(|seg| HIDDEN_SEGMENTS.contains(&seg))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `true` if this path should be kept for ingestion.
pub fn path_is_allowed(path: &str) -> bool {
    if has_hidden_segment(path) {
        return false;
    }
    let name = basename(path);
    if LOCKFILE_BASENAMES.contains(&name) {
        return false;
    }
    if BAD_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return false;
    }
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if BINARY_MEDIA_ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    if ext.is_empty() && !SPECIAL_NAME_FILES.contains(&name) {
        // extensionless files are kept only when they're a well-known
        // special name; anything else is most likely a binary or a
        // build artifact
        return SPECIAL_NAME_FILES.contains(&name);
    }
    true
}

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hidden_segments_and_lockfiles() {
        assert!(!path_is_allowed("node_modules/left-pad/index.js"));
        assert!(!path_is_allowed(".github/workflows/ci.yml"));
        assert!(!path_is_allowed("package-lock.json"));
        assert!(!path_is_allowed("frontend/Cargo.lock"));
    }

    #[test]
    fn rejects_binary_and_bundle_suffixes() {
        assert!(!path_is_allowed("assets/logo.png"));
        assert!(!path_is_allowed("dist/app.min.js"));
        assert!(!path_is_allowed("styles.bundle.css"));
    }

    #[test]
    fn keeps_special_name_files_and_ordinary_source() {
        assert!(path_is_allowed("Dockerfile"));
        assert!(path_is_allowed("docs/guide.md"));
        assert!(path_is_allowed("src/main.rs"));
    }
}
