//! # item-rag CLI
//!
//! ```bash
//! item-rag --config ./config/item-rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `item-rag init` | Create the SQLite database and run schema migrations |
//! | `item-rag serve` | Start the HTTP API server |
//! | `item-rag ask <word>` | Answer a query from stored items into a `.docx` |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use item_rag::{ask, config, migrate, server};

/// item-rag: item CRUD API with retrieval-augmented `.docx` reports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/item-rag.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "item-rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/item-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind`, creating the schema first if needed.
    Serve,

    /// Answer a query from stored items and write a `.docx` report.
    ///
    /// Searches item descriptions for WORD, ranks the matches, asks the
    /// configured model, and writes the answer to a document.
    Ask {
        /// Word to search for in item descriptions.
        word: String,

        /// Output path (defaults to `[report].filename`).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { word, output } => {
            ask::run_ask(&cfg, &word, output.as_deref()).await?;
        }
    }

    Ok(())
}
