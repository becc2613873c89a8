//! # Shard Index CLI (`shards`)
//!
//! Builds per-document shard artifacts, maintains the shared SQLite store,
//! and queries either backend.
//!
//! ## Usage
//!
//! ```bash
//! shards --config ./config/shards.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shards build --doc-root <dir>` | Build (or incrementally rebuild) a shard artifact |
//! | `shards init` | Create the SQLite store and verify its schema version |
//! | `shards ingest <doc_dir>` | Ingest one document into the store |
//! | `shards ingest-all` | Ingest every document under the corpus root |
//! | `shards status` | Per-document section and token totals |
//! | `shards drop <doc_id>` | Delete one document's rows |
//! | `shards query` | Keyword, regex, or BM25 free-text retrieval |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild only if something changed
//! shards build --doc-root docs/map/guide --changed
//!
//! # Free-text query against an artifact
//! shards query --backend shard --shards docs/map/guide/shards.json --query "configuration options"
//!
//! # Regex across the whole store, one document only
//! shards query --backend sqlite --regex 'parse\w+' --doc guide --json
//! ```

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shard_index::build::{self, BuildOptions};
use shard_index::config;
use shard_index::ingest;
use shard_index::search::{self, Backend, QueryRequest};
use shard_index::status;
use shard_index_core::search::Query;

/// Shard Index: offline section indexing and retrieval for documentation
/// corpora.
#[derive(Parser)]
#[command(
    name = "shards",
    about = "Shard Index: offline section indexing and retrieval for documentation corpora",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/shards.toml`; a missing file means built-in
    /// defaults rooted at the current directory.
    #[arg(long, global = true, default_value = "./config/shards.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    /// `SHARDS_LOG` overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a document's shard artifact.
    ///
    /// Loads the section directory (or markdown source), diffs it against
    /// the previous manifest, and rewrites the artifact and manifest
    /// atomically.
    Build {
        /// Document root (`<corpus>/<docId>`).
        #[arg(long)]
        doc_root: PathBuf,

        /// Artifact path (defaults to `<doc-root>/shards.json`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the rebuild when no section or metadata changed.
        #[arg(long)]
        changed: bool,

        /// Rebuild even when `--changed` finds nothing to do.
        #[arg(long)]
        force: bool,

        /// Report the change set and artifact size without writing.
        #[arg(long)]
        dry_run: bool,

        /// List added, changed, and removed section ids.
        #[arg(long)]
        report: bool,
    },

    /// Create the store schema (idempotent).
    Init,

    /// Ingest one document into the store.
    Ingest {
        /// Document root (`<corpus>/<docId>`).
        doc_dir: PathBuf,
    },

    /// Ingest every eligible document under a corpus root.
    IngestAll {
        /// Corpus root (defaults to `corpus.root` from config).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show per-document section counts, token totals, and last update.
    Status,

    /// Delete every section of a document from the store.
    Drop {
        doc_id: String,
    },

    /// Query a shard artifact or the store.
    #[command(group(
        ArgGroup::new("mode")
            .required(true)
            .args(["keyword", "regex", "query"])
    ))]
    Query {
        /// Backend to query.
        #[arg(long, value_enum, default_value = "sqlite")]
        backend: Backend,

        /// Shard artifact (required with `--backend shard`).
        #[arg(long)]
        shards: Option<PathBuf>,

        /// Exact keyword from the keyword index.
        #[arg(long)]
        keyword: Option<String>,

        /// Regex over section content (case-insensitive by default).
        #[arg(long)]
        regex: Option<String>,

        /// Free-text query ranked with BM25.
        #[arg(long)]
        query: Option<String>,

        /// Only return sections of this document (sqlite backend).
        #[arg(long = "doc")]
        doc: Option<String>,

        /// Maximum results (defaults to `retrieval.default_limit`).
        #[arg(long)]
        top: Option<usize>,

        /// Make `--regex` case-sensitive.
        #[arg(long)]
        case_sensitive: bool,

        /// Emit JSON instead of one line per hit.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("SHARDS_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            doc_root,
            output,
            changed,
            force,
            dry_run,
            report,
        } => {
            let opts = BuildOptions {
                doc_root,
                output,
                changed_only: changed,
                force,
                dry_run,
            };
            build::run_build(&cfg, &opts, report)?;
        }
        Commands::Init => {
            ingest::run_init(&cfg).await?;
        }
        Commands::Ingest { doc_dir } => {
            ingest::run_ingest(&cfg, &doc_dir).await?;
        }
        Commands::IngestAll { root } => {
            ingest::run_ingest_all(&cfg, root.as_deref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Drop { doc_id } => {
            ingest::run_drop(&cfg, &doc_id).await?;
        }
        Commands::Query {
            backend,
            shards,
            keyword,
            regex,
            query,
            doc,
            top,
            case_sensitive,
            json,
        } => {
            let query = match (keyword, regex, query) {
                (Some(k), _, _) => Query::Keyword(k),
                (_, Some(pattern), _) => Query::Regex {
                    pattern,
                    case_sensitive,
                },
                (_, _, Some(q)) => Query::FreeText(q),
                (None, None, None) => anyhow::bail!("one of --keyword, --regex, --query is required"),
            };
            let req = QueryRequest {
                backend,
                shards,
                query,
                doc_id: doc,
                top,
            };
            search::run_query(&cfg, &req, json).await?;
        }
    }

    Ok(())
}
