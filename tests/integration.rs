use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn docvault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docvault");
    path
}

/// A scratch environment: every `DOCVAULT_*` directory points inside a fresh
/// tempdir, so tests never touch a real user's config/cache.
struct Env {
    _tmp: TempDir,
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

fn setup_env() -> Env {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    let cache_dir = tmp.path().join("cache");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::create_dir_all(&cache_dir).unwrap();
    Env {
        _tmp: tmp,
        config_dir,
        cache_dir,
    }
}

fn run(env: &Env, args: &[&str]) -> (String, String, bool) {
    let binary = docvault_binary();
    let output = Command::new(&binary)
        .env("DOCVAULT_CONFIG_DIR", &env.config_dir)
        .env("DOCVAULT_CACHE_DIR", &env.cache_dir)
        .env("DOCVAULT_DB_PATH", env.cache_dir.join("index.sqlite3"))
        .env("DOCVAULT_LIBRARY_DB_DIR", env.cache_dir.join("db"))
        .arg("--quiet")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run docvault binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn detect_classifies_owner_repo_shorthand_as_github() {
    let env = setup_env();
    let (stdout, stderr, success) = run(&env, &["detect", "--json", "honojs/website"]);
    assert!(success, "detect failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("\"kind\": \"github\""));
    assert!(stdout.contains("\"owner\": \"honojs\""));
}

#[test]
fn detect_classifies_github_url_as_github() {
    let env = setup_env();
    let (stdout, _, success) = run(&env, &["detect", "--json", "https://github.com/honojs/website"]);
    assert!(success);
    assert!(stdout.contains("\"repo\": \"website\""));
}

#[test]
fn detect_classifies_other_url_as_web() {
    let env = setup_env();
    let (stdout, _, success) = run(&env, &["detect", "--json", "https://hono.dev/docs"]);
    assert!(success);
    assert!(stdout.contains("\"kind\": \"web\""));
}

#[test]
fn detect_rejects_unclassifiable_input() {
    let env = setup_env();
    let (_, stderr, success) = run(&env, &["detect", "not a thing"]);
    assert!(!success, "unclassifiable input should fail");
    assert!(stderr.contains("could not classify"), "got: {stderr}");
}

#[test]
fn add_list_and_remove_github_source() {
    let env = setup_env();

    let (stdout, stderr, success) = run(
        &env,
        &["add", "--kind", "github", "--name", "hono", "--owner", "honojs", "--repo", "website"],
    );
    assert!(success, "add failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("added github source hono"));

    let (stdout, _, success) = run(&env, &["source", "list"]);
    assert!(success);
    assert!(stdout.contains("hono"));
    assert!(stdout.contains("github"));

    let (stdout, _, success) = run(&env, &["source", "remove", "hono"]);
    assert!(success, "remove failed: {stdout}");

    let (stdout, _, success) = run(&env, &["source", "list"]);
    assert!(success);
    assert!(!stdout.contains("hono"));
}

#[test]
fn add_web_source_requires_root_url() {
    let env = setup_env();
    let (_, stderr, success) = run(&env, &["add", "--kind", "web", "--name", "hono-docs"]);
    assert!(!success, "web source without --root-url should fail");
    assert!(stderr.contains("--root-url"), "got: {stderr}");
}

#[test]
fn add_rejects_duplicate_source_names() {
    let env = setup_env();
    let (_, _, first) = run(
        &env,
        &["add", "--kind", "web", "--name", "dup", "--root-url", "https://example.com/docs"],
    );
    assert!(first);

    let (_, stderr, second) = run(
        &env,
        &["add", "--kind", "web", "--name", "dup", "--root-url", "https://example.com/other"],
    );
    assert!(!second, "duplicate source name should be rejected");
    assert!(stderr.contains("already exists"), "got: {stderr}");
}

#[test]
fn status_on_empty_index_succeeds_with_no_sources() {
    let env = setup_env();
    let (stdout, _, success) = run(&env, &["status", "--json"]);
    assert!(success);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn reset_recreates_the_index_database() {
    let env = setup_env();
    run(&env, &["add", "--kind", "web", "--name", "toreset", "--root-url", "https://example.com"]);

    let (stdout, _, success) = run(&env, &["reset"]);
    assert!(success, "reset failed: {stdout}");
    assert!(stdout.contains("reset index db"));

    let (stdout, _, success) = run(&env, &["source", "list", "--json"]);
    assert!(success);
    assert_eq!(stdout.trim(), "[]", "reset should have dropped the previously registered source");
}

#[test]
fn get_on_unknown_library_fails_with_a_clear_error() {
    let env = setup_env();
    let (_, stderr, success) = run(&env, &["get", "--library", "nope", "some/path.md"]);
    assert!(!success);
    assert!(stderr.contains("unknown source: nope"), "got: {stderr}");
}

#[test]
fn search_rejects_an_unknown_mode() {
    let env = setup_env();
    run(&env, &["add", "--kind", "web", "--name", "modetest", "--root-url", "https://example.com"]);

    let (_, stderr, success) = run(&env, &["search", "--library", "modetest", "--mode", "bogus", "anything"]);
    assert!(!success, "unknown search mode should fail");
    assert!(stderr.contains("unknown search mode"), "got: {stderr}");
}

#[test]
fn search_on_empty_library_returns_no_results() {
    let env = setup_env();
    run(&env, &["add", "--kind", "web", "--name", "emptylib", "--root-url", "https://example.com"]);

    let (stdout, stderr, success) = run(&env, &["search", "--library", "emptylib", "--mode", "word", "anything"]);
    assert!(success, "search failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("No results"));
}

#[test]
fn library_shorthand_requires_a_query() {
    let env = setup_env();
    let (_, stderr, success) = run(&env, &["library", "anylib"]);
    assert!(!success, "library without a query should fail");
    assert!(stderr.contains("requires a query"), "got: {stderr}");
}

#[test]
fn cleanup_on_a_freshly_registered_library_reports_zero() {
    let env = setup_env();
    run(&env, &["add", "--kind", "web", "--name", "freshlib", "--root-url", "https://example.com"]);

    let (stdout, stderr, success) = run(&env, &["cleanup"]);
    assert!(success, "cleanup failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("removed 0 inactive documents"));
}

#[test]
fn seed_with_no_ingest_only_registers_sources() {
    let env = setup_env();
    let (stdout, stderr, success) = run(
        &env,
        &["seed", "--url", "honojs/website", "--url", "https://example.com/docs", "--no-ingest"],
    );
    assert!(success, "seed failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("seeded honojs/website"));
    assert!(stdout.contains("seeded https://example.com/docs"));

    let (stdout, _, success) = run(&env, &["source", "list"]);
    assert!(success);
    assert!(stdout.contains("honojs/website"));
    assert!(stdout.contains("https://example.com/docs"));
}
