//! # docvec CLI
//!
//! The `docvec` binary ingests PDFs into a Qdrant collection and searches
//! them.
//!
//! ## Usage
//!
//! ```bash
//! docvec --config ./config/docvec.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvec init` | Create the collection if it does not exist |
//! | `docvec ingest <path>` | Hash, extract, chunk, embed and store a file or directory |
//! | `docvec search "<query>"` | Similarity search with file and date filters |
//! | `docvec get <file-name>` | Print every stored chunk of one file |
//! | `docvec delete <file-name>` | Remove a file's chunks and its ledger entry |
//! | `docvec stats` | Point count and ledger size |
//!
//! Logs go to stderr (`RUST_LOG` or `--verbose`); command output goes to
//! stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docvec::config;
use docvec::search::SearchArgs;

/// docvec: chunk, embed and search PDF documents in Qdrant.
#[derive(Parser)]
#[command(
    name = "docvec",
    about = "docvec: PDF ingestion and retrieval over a Qdrant collection",
    version,
    long_about = "docvec splits documents into overlapping passages, embeds each passage \
    with the configured provider (OpenAI, Azure OpenAI or Ollama), and stores them in a \
    Qdrant collection with file name, hash and timestamp metadata for filtered similarity search."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvec.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection (idempotent).
    Init,

    /// Ingest a file, or every matching file under a directory.
    ///
    /// Files whose content hash is already recorded in the ledger are
    /// skipped. A failing file is reported and the run continues.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Reprocess files even if they are unchanged.
        #[arg(long)]
        force: bool,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search stored chunks by similarity.
    Search {
        /// The search query string.
        query: String,

        /// Restrict to a file name (repeatable; names are OR'd).
        #[arg(long = "file")]
        files: Vec<String>,

        /// Only chunks processed on or after this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        after: Option<String>,

        /// Only chunks processed on or before this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        before: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Drop results scoring below this similarity.
        #[arg(long)]
        min_score: Option<f32>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print every stored chunk of a file, in order.
    Get {
        /// File name as ingested (basename, e.g. `manual.pdf`).
        file_name: String,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a file's chunks and forget it in the ledger.
    Delete {
        /// File name as ingested (basename, e.g. `manual.pdf`).
        file_name: String,
    },

    /// Show collection and ledger statistics.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "docvec=debug" } else { "docvec=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let repository = docvec::qdrant::open_repository(&cfg)?;
            repository.initialize().await?;
            println!(
                "Collection '{}' ready ({} dims).",
                cfg.qdrant.collection,
                repository.dims()
            );
        }
        Commands::Ingest { path, force, json } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current chunk");
                    on_signal.cancel();
                }
            });

            let result = docvec::ingest::run_ingest(&cfg, &path, force, json, cancel).await?;
            if result.error_count > 0 || result.cancelled {
                std::process::exit(1);
            }
        }
        Commands::Search {
            query,
            files,
            after,
            before,
            limit,
            min_score,
            json,
        } => {
            let args = SearchArgs {
                query,
                files,
                after,
                before,
                limit,
                min_score,
                json,
            };
            docvec::search::run_search(&cfg, &args).await?;
        }
        Commands::Get { file_name, json } => {
            docvec::get::run_get(&cfg, &file_name, json).await?;
        }
        Commands::Delete { file_name } => {
            docvec::delete::run_delete(&cfg, &file_name).await?;
        }
        Commands::Stats => {
            docvec::stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
