//! # docvault
//!
//! A local-first documentation indexer and hybrid search engine for
//! developer docs. This binary is a thin `clap` CLI over the `docvault`
//! library — every command below calls straight into a library module and
//! never reimplements ingestion, chunking, or search logic inline.
//!
//! ## Modules
//!
//! - [`docvault::config`] — YAML configuration parsing and validation
//! - [`docvault::paths`] — config/cache directory resolution
//! - [`docvault::store`] — index DB + per-library DBs, migrations
//! - [`docvault::sources`] — source registration, status, detection
//! - [`docvault::ingest`] — ingest orchestrator (GitHub sync / web crawl)
//! - [`docvault::embed`] — local embedding provider and embed orchestration
//! - [`docvault::search`] — word, vector, and hybrid search
//! - [`docvault::get`] — document retrieval by id, path, or uri

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docvault::config::{self, Config};
use docvault::embed;
use docvault::get::{self, Slice};
use docvault::ingest;
use docvault::models::IngestMode;
use docvault::paths;
use docvault::progress::ProgressMode;
use docvault::search::{self, SearchMode};
use docvault::sources::{self, GithubSourceParams, WebSourceParams};
use docvault::store::{index, Store};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "docvault",
    about = "A local-first documentation indexer and hybrid search engine for developer docs",
    version
)]
struct Cli {
    /// Override the config file path (default: per-OS user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable human progress output on stderr.
    #[arg(long, global = true)]
    quiet: bool,

    /// Emit progress as JSON lines on stderr instead of human text.
    #[arg(long, global = true)]
    json_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new library (alias for `source add`).
    Add(AddArgs),

    /// Manage registered libraries.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Sync/crawl one or every registered source into its library DB.
    Ingest {
        #[arg(long = "source")]
        source: Option<String>,
        #[arg(long)]
        embed: bool,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Generate embeddings for chunks that don't have one yet.
    Embed {
        #[arg(long = "source")]
        source: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        force: bool,
    },

    /// Search one library.
    Search {
        #[arg(long)]
        library: String,
        #[arg(long, default_value = "hybrid")]
        mode: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        json: bool,
        query: String,
    },

    /// Shorthand: `docvault library <name> <query words...>`, equivalent to
    /// `search --library <name> --mode hybrid`.
    Library {
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        json: bool,
        library: String,
        query: Vec<String>,
    },

    /// Retrieve a document by id, path, or uri.
    Get {
        #[arg(long)]
        library: String,
        #[arg(long = "doc")]
        doc: Option<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        slice: Option<String>,
        #[arg(long)]
        json: bool,
        /// Document path or uri; omit when using `--doc`.
        path_or_uri: Option<String>,
    },

    /// Print last-sync bookkeeping for every registered source.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Garbage-collect inactive documents and orphaned blobs in every
    /// library DB.
    Cleanup,

    /// Classify a bare repo/url string as `github` or `web` without
    /// performing any network I/O.
    Detect {
        #[arg(long)]
        json: bool,
        input: String,
    },

    /// Bulk-register sources from `--file`/`--url`, then ingest and embed
    /// them (unless suppressed).
    Seed {
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        #[arg(long = "url")]
        urls: Vec<String>,
        #[arg(long)]
        no_ingest: bool,
        #[arg(long)]
        no_embed: bool,
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Drop and recreate the index DB, or one source's library DB.
    Reset {
        #[arg(long = "source")]
        source: Option<String>,
    },
}

#[derive(clap::Args)]
struct AddArgs {
    #[arg(long, value_enum)]
    kind: SourceKindArg,
    #[arg(long)]
    name: String,

    // github
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    repo: Option<String>,
    #[arg(long = "ref")]
    git_ref: Option<String>,
    #[arg(long)]
    docs_path: Option<String>,
    #[arg(long, value_enum)]
    mode: Option<IngestModeArg>,

    // web
    #[arg(long)]
    root_url: Option<String>,
    #[arg(long = "allowed-path")]
    allowed_paths: Vec<String>,
    #[arg(long = "denied-path")]
    denied_paths: Vec<String>,
    #[arg(long)]
    max_depth: Option<i64>,
    #[arg(long)]
    max_pages: Option<i64>,

    #[arg(long)]
    version_label: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SourceKindArg {
    Github,
    Web,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum IngestModeArg {
    Docs,
    Repo,
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new library.
    Add(AddArgs),
    /// List registered libraries.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a library's registration (the library DB file is left on
    /// disk).
    Remove { id: String },
}

async fn run_add(pool: &sqlx::SqlitePool, args: AddArgs) -> Result<()> {
    match args.kind {
        SourceKindArg::Github => {
            let owner = args.owner.context("--owner is required for --kind github")?;
            let repo = args.repo.context("--repo is required for --kind github")?;
            let source = sources::add_github_source(
                pool,
                GithubSourceParams {
                    name: args.name,
                    owner,
                    repo,
                    git_ref: args.git_ref,
                    docs_path: args.docs_path,
                    ingest_mode: args.mode.map(|m| match m {
                        IngestModeArg::Docs => IngestMode::Docs,
                        IngestModeArg::Repo => IngestMode::Repo,
                    }),
                    version_label: args.version_label,
                },
            )
            .await?;
            println!("added github source {} ({})", source.name, source.id);
        }
        SourceKindArg::Web => {
            let root_url = args.root_url.context("--root-url is required for --kind web")?;
            let source = sources::add_web_source(
                pool,
                WebSourceParams {
                    name: args.name,
                    root_url,
                    allowed_paths: args.allowed_paths,
                    denied_paths: args.denied_paths,
                    max_depth: args.max_depth,
                    max_pages: args.max_pages,
                    version_label: args.version_label,
                },
            )
            .await?;
            println!("added web source {} ({})", source.name, source.id);
        }
    }
    Ok(())
}

fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent("docvault/0.1");
    if let Some(endpoint) = &config.proxy.endpoint {
        builder = builder.proxy(reqwest::Proxy::all(endpoint.as_str())?);
    }
    builder.build().context("failed to build HTTP client")
}

fn print_ingest_summaries(summaries: &[ingest::IngestSummary]) {
    for summary in summaries {
        if let Some(error) = &summary.error {
            eprintln!("{}: error: {error}", summary.source_name);
            continue;
        }
        println!(
            "{}: versions_synced={} documents_ingested={} documents_kept_active={} pages_fetched={} pages_failed={}",
            summary.source_name,
            summary.versions_synced,
            summary.documents_ingested,
            summary.documents_kept_active,
            summary.pages_fetched,
            summary.pages_failed,
        );
    }
}

async fn run_embed_for_sources(
    store: &Store,
    only_source: Option<&str>,
    model: Option<&str>,
    force: bool,
) -> Result<Vec<embed::EmbedSummary>> {
    let Some(provider) = embed::resolve_provider(model, &paths::models_dir()) else {
        bail!("no local embedding model available: vector search not ready");
    };

    let to_embed = if let Some(name) = only_source {
        vec![sources::resolve_source(&store.index_pool, name).await?]
    } else {
        index::list_sources(&store.index_pool).await?
    };

    let mut summaries = Vec::with_capacity(to_embed.len());
    for source in &to_embed {
        let library_pool = store.open_library(std::path::Path::new(&source.library_db_path)).await?;
        let summary = embed::embed_source(&library_pool, &source.name, provider.as_ref(), force).await;
        match summary {
            Ok(s) => summaries.push(s),
            Err(e) => summaries.push(embed::EmbedSummary {
                source_name: source.name.clone(),
                embedded: 0,
                error: Some(e.to_string()),
            }),
        }
    }
    Ok(summaries)
}

fn print_embed_summaries(summaries: &[embed::EmbedSummary]) {
    for summary in summaries {
        match &summary.error {
            Some(e) => eprintln!("{}: error: {e}", summary.source_name),
            None => println!("{}: embedded={}", summary.source_name, summary.embedded),
        }
    }
}

fn print_search_items(items: &[docvault::models::SearchResultItem], json: bool) -> Result<()> {
    if json {
        let meta = serde_json::json!({ "count": items.len() });
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "items": items, "meta": meta }))?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for item in items {
        println!(
            "{:.3}  {}  {}  [{}]",
            item.score, item.path, item.context_path, item.slice
        );
        println!("      {}", item.preview);
    }
    Ok(())
}

async fn open_library_pool(store: &Store, library: &str) -> Result<(docvault::models::Source, sqlx::SqlitePool)> {
    let source = sources::resolve_source(&store.index_pool, library).await?;
    let pool = store.open_library(std::path::Path::new(&source.library_db_path)).await?;
    Ok((source, pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    paths::ensure_dirs().ok();

    let config_path = cli.config.clone().unwrap_or_else(paths::config_file);
    let config = config::load_config_or_default(&config_path)?;

    let progress_mode = if cli.quiet {
        ProgressMode::Off
    } else if cli.json_progress {
        ProgressMode::Json
    } else {
        ProgressMode::default_for_tty()
    };
    let reporter = progress_mode.reporter();

    let store = Store::open(paths::index_db_path(), paths::library_db_dir()).await?;
    let client = build_http_client(&config)?;

    let result = run_command(cli.command, &store, &config, &client, reporter.as_ref()).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run_command(
    command: Commands,
    store: &Store,
    config: &Config,
    client: &reqwest::Client,
    reporter: &dyn docvault::progress::SyncProgressReporter,
) -> Result<()> {
    match command {
        Commands::Add(args) => run_add(&store.index_pool, args).await?,
        Commands::Source { action } => match action {
            SourceAction::Add(args) => run_add(&store.index_pool, args).await?,
            SourceAction::List { json } => {
                let sources = index::list_sources(&store.index_pool).await?;
                sources::print_source_list(&sources, json)?;
            }
            SourceAction::Remove { id } => {
                sources::remove_source(&store.index_pool, &id).await?;
                println!("removed source {id}");
            }
        },
        Commands::Ingest { source, embed: should_embed, force, concurrency } => {
            let summaries = ingest::ingest_all(
                store,
                config,
                client,
                source.as_deref(),
                force,
                concurrency.unwrap_or(5),
                reporter,
            )
            .await?;
            print_ingest_summaries(&summaries);
            if should_embed {
                let embed_summaries = run_embed_for_sources(store, source.as_deref(), None, force).await?;
                print_embed_summaries(&embed_summaries);
            }
        }
        Commands::Embed { source, model, force } => {
            let summaries = run_embed_for_sources(store, source.as_deref(), model.as_deref(), force).await?;
            print_embed_summaries(&summaries);
        }
        Commands::Search { library, mode, version, json, query } => {
            let (source, pool) = open_library_pool(store, &library).await?;
            let mode = SearchMode::from_str(&mode)?;
            let provider = embed::resolve_provider(None, &paths::models_dir());
            let items = match mode {
                SearchMode::Word => search::search_word(&pool, &query, version.as_deref(), &source.name).await?,
                SearchMode::Vector => {
                    search::search_vector(&pool, &query, version.as_deref(), &source.name, provider.as_deref())
                        .await?
                }
                SearchMode::Hybrid => {
                    search::search_hybrid(
                        &pool,
                        &query,
                        version.as_deref(),
                        &source.name,
                        &config.search,
                        provider.as_deref(),
                    )
                    .await?
                }
            };
            print_search_items(&items, json)?;
        }
        Commands::Library { version, json, library, query } => {
            if query.is_empty() {
                bail!("library requires a query");
            }
            let (source, pool) = open_library_pool(store, &library).await?;
            let joined = query.join(" ");
            let provider = embed::resolve_provider(None, &paths::models_dir());
            let items = search::search_hybrid(
                &pool,
                &joined,
                version.as_deref(),
                &source.name,
                &config.search,
                provider.as_deref(),
            )
            .await?;
            print_search_items(&items, json)?;
        }
        Commands::Get { library, doc, version, slice, json, path_or_uri } => {
            let (_source, pool) = open_library_pool(store, &library).await?;
            let slice = slice.map(|s| Slice::from_str(&s)).transpose()?;
            let document = get::get_document(&pool, doc.as_deref(), path_or_uri.as_deref(), version.as_deref(), slice).await?;
            get::print_document(&document, json)?;
        }
        Commands::Status { json } => {
            let statuses = sources::status(&store.index_pool).await?;
            sources::print_status(&statuses, json)?;
        }
        Commands::Cleanup => {
            let all_sources = index::list_sources(&store.index_pool).await?;
            for source in &all_sources {
                let pool = store.open_library(std::path::Path::new(&source.library_db_path)).await?;
                let (docs, blobs) = docvault::store::library::cleanup_inactive(&pool).await?;
                println!("{}: removed {docs} inactive documents, {blobs} orphaned blobs", source.name);
            }
        }
        Commands::Detect { json, input } => {
            let detected = sources::detect(&input)?;
            sources::print_detected(&detected, json)?;
        }
        Commands::Seed { files, urls, no_ingest, no_embed, concurrency } => {
            let mut entries = urls;
            for file in &files {
                let content = std::fs::read_to_string(file)
                    .with_context(|| format!("failed to read seed file: {}", file.display()))?;
                entries.extend(content.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')).map(String::from));
            }

            let mut added = Vec::new();
            for entry in &entries {
                let detected = sources::detect(entry)?;
                let source = match detected {
                    sources::Detected::Github { owner, repo, docs_path, ingest_mode } => {
                        sources::add_github_source(
                            &store.index_pool,
                            GithubSourceParams {
                                name: format!("{owner}/{repo}"),
                                owner,
                                repo,
                                git_ref: None,
                                docs_path,
                                ingest_mode: IngestMode::from_str(&ingest_mode).ok(),
                                version_label: None,
                            },
                        )
                        .await?
                    }
                    sources::Detected::Web { root_url } => {
                        sources::add_web_source(
                            &store.index_pool,
                            WebSourceParams {
                                name: root_url.clone(),
                                root_url,
                                allowed_paths: Vec::new(),
                                denied_paths: Vec::new(),
                                max_depth: None,
                                max_pages: None,
                                version_label: None,
                            },
                        )
                        .await?
                    }
                };
                println!("seeded {} ({})", source.name, source.id);
                added.push(source.name);
            }

            if !no_ingest {
                for name in &added {
                    let summaries = ingest::ingest_all(store, config, client, Some(name), false, concurrency.unwrap_or(5), reporter).await?;
                    print_ingest_summaries(&summaries);
                    if !no_embed {
                        let embed_summaries = run_embed_for_sources(store, Some(name.as_str()), None, false).await?;
                        print_embed_summaries(&embed_summaries);
                    }
                }
            }
        }
        Commands::Reset { source } => match source {
            Some(name) => {
                let source = sources::resolve_source(&store.index_pool, &name).await?;
                docvault::store::reset_library(std::path::Path::new(&source.library_db_path)).await?;
                println!("reset library db for {}", source.name);
            }
            None => {
                docvault::store::reset_index(&paths::index_db_path()).await?;
                println!("reset index db");
            }
        },
    }
    Ok(())
}
