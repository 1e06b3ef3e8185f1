//! # ForestMind CLI (`fmind`)
//!
//! The `fmind` binary drives the indexing engine from the command line.
//! It provides commands for database initialization, one-shot folder
//! indexing, retrieval, and starting the HTTP server the chat frontend
//! talks to.
//!
//! ## Usage
//!
//! ```bash
//! fmind --config ./config/fmind.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fmind init` | Create the SQLite database and run schema migrations |
//! | `fmind index <folder>` | One-shot index of a folder into a session |
//! | `fmind search "<prompt>"` | Semantic top-K retrieval over a session |
//! | `fmind symbols <keyword>...` | Keyword symbol lookup with live snippets |
//! | `fmind serve` | Start the HTTP server (watcher driven by the API) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use forestmind::{config, db, indexer, migrate, search, server, session, watcher};

/// ForestMind CLI — an incremental code-context indexing and retrieval
/// engine for chat assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fmind.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fmind",
    about = "ForestMind — incremental code-context indexing and retrieval for chat assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the code_map, vector_index,
    /// and attachment_path tables. Idempotent.
    Init,

    /// Index a folder into a session without watching it.
    ///
    /// Walks the folder, applies the ignore policy, and reconciles every
    /// eligible source file against the store. Running it again after
    /// edits updates only what changed. With no folder argument, all
    /// folders attached to the session are indexed.
    Index {
        /// Folder to index. Defaults to the session's attached folders.
        folder: Option<PathBuf>,

        /// Session to index into.
        #[arg(long)]
        session: String,

        /// Also record the folder as attached to the session.
        #[arg(long)]
        attach: bool,
    },

    /// Semantic search over a session's indexed chunks.
    Search {
        /// The query prompt.
        prompt: String,

        /// Session to search in.
        #[arg(long)]
        session: String,

        /// Number of results.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Keyword symbol lookup with live file snippets.
    Symbols {
        /// Keywords matched against symbol names and signatures.
        keywords: Vec<String>,
    },

    /// Start the HTTP server.
    ///
    /// The watch lifecycle is driven entirely through the API: the
    /// server starts idle until a session is selected.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            folder,
            session,
            attach,
        } => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;

            if attach {
                if let Some(folder) = &folder {
                    session::attach_folder(&pool, &folder.to_string_lossy(), &session).await?;
                }
            }

            let roots = match folder {
                Some(folder) => vec![folder],
                None => session::attached_folders(&pool, &session).await?,
            };
            if roots.is_empty() {
                anyhow::bail!("no folder given and session '{}' has no attached folders", session);
            }

            let excludes = watcher::build_globset(&cfg.watcher.exclude_globs)?;
            let files = watcher::eligible_files(&roots, &excludes);
            let total = files.len();
            let mut failed = 0usize;
            for path in files {
                if let Err(e) = indexer::sync_file(&pool, &cfg, &path, &session).await {
                    eprintln!("  failed: {} ({})", path.display(), e);
                    failed += 1;
                }
            }
            println!(
                "Indexed {} of {} files into session '{}'.",
                total - failed,
                total,
                session
            );
        }
        Commands::Search { prompt, session, k } => {
            let pool = db::connect(&cfg).await?;
            let k = k.unwrap_or(cfg.retrieval.semantic_limit);
            let hits = search::semantic_search(&pool, &cfg, &prompt, &session, k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for hit in &hits {
                println!("[{:.4}] {}", hit.score, hit.file_path);
                println!("{}", hit.content);
                println!();
            }
        }
        Commands::Symbols { keywords } => {
            let pool = db::connect(&cfg).await?;
            let hits = search::symbol_search(&pool, &keywords, cfg.retrieval.symbol_limit).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for hit in &hits {
                println!(
                    "{} {} ({}:{}-{})",
                    hit.kind, hit.name, hit.file_path, hit.start_line, hit.end_line
                );
                if !hit.snippet.is_empty() {
                    println!("{}", hit.snippet);
                }
                println!();
            }
        }
        Commands::Serve => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            server::run_server(&cfg, pool).await?;
        }
    }

    Ok(())
}
