//! Configuration parsing and validation.
//!
//! docvault is configured via a YAML file (default: `<config-dir>/config.yml`,
//! see [`crate::paths`]). Every key is optional; defaults match spec §6.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub hf: HfConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub headless: HeadlessConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GithubConfig {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HfConfig {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    pub embed: Option<String>,
    pub query: Option<String>,
    pub rerank: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_strong_score")]
    pub strong_score: f64,
    #[serde(default = "default_strong_gap")]
    pub strong_gap: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strong_score: default_strong_score(),
            strong_gap: default_strong_gap(),
        }
    }
}

fn default_strong_score() -> f64 {
    0.85
}
fn default_strong_gap() -> f64 {
    0.15
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProxyConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HeadlessConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_headless_timeout")]
    pub timeout: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chrome_path: None,
            proxy: None,
            timeout: default_headless_timeout(),
        }
    }
}

fn default_headless_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfig {
    #[serde(default = "default_crawl_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,
    #[serde(default)]
    pub require_code_snippets: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: default_crawl_concurrency(),
            min_body_chars: default_min_body_chars(),
            require_code_snippets: false,
        }
    }
}

fn default_crawl_concurrency() -> usize {
    5
}
fn default_min_body_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    #[serde(default = "default_max_major_versions")]
    pub max_major_versions: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_major_versions: default_max_major_versions(),
        }
    }
}

fn default_max_major_versions() -> usize {
    3
}

/// Load and validate a YAML config file. A missing file is not an error —
/// callers resolve the path via [`crate::paths::config_file`] first and only
/// call this when the file exists, or pass defaults otherwise.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config =
        serde_yaml::from_str(&content).with_context(|| "failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.search.strong_score) {
        anyhow::bail!("search.strongScore must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.search.strong_gap) {
        anyhow::bail!("search.strongGap must be in [0.0, 1.0]");
    }
    if config.crawl.concurrency == 0 {
        anyhow::bail!("crawl.concurrency must be > 0");
    }
    if config.ingest.max_major_versions == 0 {
        anyhow::bail!("ingest.maxMajorVersions must be > 0");
    }

    Ok(config)
}

/// Load config from `path` if it exists, else fall back to defaults. Matches
/// the teacher's "config is always present, CLI builds it" posture, except
/// docvault tolerates an absent file since config.yml is entirely optional
/// (spec §6: "all keys are optional").
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_within_spec_ranges() {
        let config = Config::default();
        assert_eq!(config.search.strong_score, 0.85);
        assert_eq!(config.search.strong_gap, 0.15);
        assert_eq!(config.crawl.concurrency, 5);
        assert_eq!(config.ingest.max_major_versions, 3);
    }

    #[test]
    fn parses_partial_yaml_with_camel_case_keys() {
        let yaml = "github:\n  token: abc123\nsearch:\n  strongScore: 0.9\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.github.token.as_deref(), Some("abc123"));
        assert_eq!(config.search.strong_score, 0.9);
        assert_eq!(config.search.strong_gap, 0.15);
    }

    #[test]
    fn rejects_out_of_range_strong_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "search:\n  strongScore: 1.5\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
