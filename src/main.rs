//! # PDF Links CLI (`pdflinks`)
//!
//! Recovers the hyperlinks of a PDF and submits them to the Robust Links
//! archive.
//!
//! ## Usage
//!
//! ```bash
//! pdflinks --config ./config/pdflinks.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdflinks init` | Create the SQLite database and PDF directory |
//! | `pdflinks upload <file>` | Store a PDF and print its id |
//! | `pdflinks extract <file>` | Print the links of a local PDF without storing it |
//! | `pdflinks links <id>` | Print the links of a stored PDF |
//! | `pdflinks robustify <id> [URI...] [--all]` | Stream archive outcomes as NDJSON |
//! | `pdflinks mappings <id>` | Print the persisted robust mapping |
//! | `pdflinks serve` | Start the HTTP server |
//!
//! Logs go to stderr and honour `RUST_LOG`; stdout carries only results.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdf_links::{commands, config, migrate, server};

/// Recover PDF hyperlinks and make them robust against link rot.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pdflinks.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "pdflinks", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdflinks.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and PDF directory. Idempotent.
    Init,

    /// Store a PDF; prints its content hash.
    Upload {
        /// Path to the PDF.
        file: PathBuf,
    },

    /// Print the links of a local PDF without storing it.
    Extract {
        file: PathBuf,

        /// Print a JSON array instead of one link per line.
        #[arg(long)]
        json: bool,
    },

    /// Print the links of a stored PDF.
    Links {
        /// Content hash printed by `upload`.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Submit URIs to the archive, streaming one JSON line per result.
    ///
    /// Results arrive in completion order. The mapping is saved when the
    /// batch ends or is interrupted with Ctrl-C.
    Robustify {
        id: String,

        /// URIs to robustify.
        uris: Vec<String>,

        /// Robustify every link extracted from the document.
        #[arg(long)]
        all: bool,
    },

    /// Print the last persisted robust mapping of a stored PDF.
    Mappings { id: String },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_links=info,tower_http=info"));
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
            std::fs::create_dir_all(&cfg.storage.pdf_dir)?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { file } => {
            commands::run_upload(&cfg, &file).await?;
        }
        Commands::Extract { file, json } => {
            commands::run_extract(&cfg, &file, json).await?;
        }
        Commands::Links { id, json } => {
            commands::run_links(&cfg, &id, json).await?;
        }
        Commands::Robustify { id, uris, all } => {
            commands::run_robustify(&cfg, &id, uris, all).await?;
        }
        Commands::Mappings { id } => {
            commands::run_mappings(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
