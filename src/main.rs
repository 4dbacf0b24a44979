//! # ARC Bot CLI (`arcbot`)
//!
//! Command-line entry point for the ARC Bot backend utilities.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `arcbot normalize [file]` | Normalize raw agent output into a response payload |
//! | `arcbot upload <file>` | Chunk a code document, embed, and insert into Supabase |
//! | `arcbot migrate` | Apply the `city_code` document-type migration |
//! | `arcbot serve` | Start the HTTP API |
//!
//! All commands accept a `--config` flag (default `./config/arcbot.toml`).
//! When the file does not exist, built-in defaults are used. Credentials
//! are environment-only: `OPENAI_API_KEY`, `SUPABASE_URL`,
//! `SUPABASE_SERVICE_KEY`.

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use uuid::Uuid;

use arcbot::config::{self, Config};
use arcbot::migrate;
use arcbot::models::SessionContext;
use arcbot::normalize::{normalize, NormalizeOptions};
use arcbot::server;
use arcbot::upload;

/// ARC Bot backend — response normalization and knowledge-base tooling for
/// municipal development-code Q&A.
#[derive(Parser)]
#[command(
    name = "arcbot",
    about = "ARC Bot backend — response normalization and knowledge-base tooling",
    version,
    long_about = "Backend utilities for ARC Bot, a retrieval-augmented Q&A assistant for \
    municipal development code: normalize raw agent output into structured answers with \
    merged citations, upload embedded code chunks to the hosted knowledge base, and serve \
    the normalizer over HTTP."
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when absent.
    #[arg(long, global = true, default_value = "./config/arcbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Normalize raw agent output into a structured response payload.
    ///
    /// Reads the raw text from FILE, or from stdin when FILE is omitted,
    /// and prints the response JSON. Never fails on malformed input —
    /// unparseable text becomes a plain-text answer.
    Normalize {
        /// File containing the raw agent output. Reads stdin when omitted.
        file: Option<PathBuf>,

        /// Session identifier echoed into the payload. Generated when omitted.
        #[arg(long)]
        session_id: Option<String>,

        /// Prior message count; the payload reports this plus one.
        #[arg(long, default_value_t = 0)]
        history_count: i64,

        /// Pass citation fragments through without merging by section.
        #[arg(long)]
        no_merge: bool,
    },

    /// Chunk a municipal-code document, embed each chunk, and insert the
    /// rows into Supabase.
    ///
    /// Runs sequentially with a fixed delay between chunks and aborts on
    /// the first failure, leaving partially uploaded state in place.
    Upload {
        /// Path to the code document (plain text).
        file: PathBuf,

        /// Show the chunk breakdown without making any network calls.
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply the schema migration that allows the `city_code` document type.
    ///
    /// Falls back to printing the SQL for manual execution when the
    /// `exec_sql` RPC is not available in the project.
    Migrate,

    /// Start the HTTP API (`POST /api/normalize`, `GET /health`).
    Serve,
}

/// Load the config file when it exists; otherwise run on defaults.
fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Normalize {
            file,
            session_id,
            history_count,
            no_merge,
        } => {
            let raw_output = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let session = SessionContext {
                session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                history_count,
            };
            let options = NormalizeOptions {
                merge_sources: cfg.normalizer.merge_sources && !no_merge,
            };

            let response = normalize(&raw_output, &session, &options);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Upload { file, dry_run } => {
            upload::run_upload(&cfg, &file, dry_run).await?;
        }
        Commands::Migrate => {
            migrate::run_migration(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
