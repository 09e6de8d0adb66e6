//! Leakstore CLI (leakctl)
//!
//! Command-line tool for operating a leakstore deployment.
//!
//! ## Overview
//!
//! `leakctl` drives the four operational surfaces:
//! - **Index building**: fan sorted metadata streams into per-part offset
//!   index files
//! - **Statistics**: per-bucket frequency tables and the merged global table
//! - **Search**: query the backend for a term and resolve every hit back to
//!   its original line
//! - **Migration**: zero-downtime correction of backend index schemas
//!
//! ## Quick Start
//!
//! ```bash
//! export LEAKSTORE_DATA=/srv/leaks
//! export LEAKSTORE_SEARCH_URL=https://search.internal:9200
//!
//! # Build the offset indexes, then the stats
//! leakctl index build
//! leakctl stats all
//!
//! # Look a term up and read the matching lines back
//! leakctl search mail.acme.com
//! leakctl scan acme.com --page-size 1000
//!
//! # Correct the backend schema, verify, then retire the old index
//! leakctl migrate run bucket-acme
//! leakctl migrate retire bucket-acme
//! ```
//!
//! ## Configuration
//!
//! Flags override environment variables, which override
//! `~/.leakstore/config.toml`. Logging is controlled via `RUST_LOG`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;
use leakstore_search::SearchClient;
use leakstore_storage::pool::DEFAULT_MAX_WORKERS;

#[derive(Parser)]
#[command(name = "leakctl")]
#[command(about = "Leakstore command-line tool", long_about = None)]
struct Cli {
    /// Data root holding the bucket directories
    #[arg(long, env = "LEAKSTORE_DATA")]
    data_dir: Option<PathBuf>,

    /// Search backend base URL
    #[arg(long, env = "LEAKSTORE_SEARCH_URL")]
    endpoint: Option<String>,

    /// Skip TLS certificate verification for the search backend
    #[arg(long)]
    insecure: bool,

    /// Worker cap for batch operations
    #[arg(long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Offset index commands
    Index {
        #[command(subcommand)]
        command: commands::IndexCommands,
    },
    /// Frequency statistics commands
    Stats {
        #[command(subcommand)]
        command: commands::StatsCommands,
    },
    /// Search for a term and resolve the hits
    Search(commands::search::SearchArgs),
    /// Scan a term's full result set via a backend cursor
    Scan(commands::search::ScanArgs),
    /// Backend index migration commands
    Migrate {
        #[command(subcommand)]
        command: commands::MigrateCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());
    let workers = cli
        .workers
        .or(config.workers)
        .unwrap_or(DEFAULT_MAX_WORKERS);

    match cli.command {
        Commands::Index { command } => {
            commands::index::handle_index_command(command, &data_dir, workers).await?
        }
        Commands::Stats { command } => {
            commands::stats::handle_stats_command(command, &data_dir, workers).await?
        }
        Commands::Search(args) => {
            let client = search_client(&config, cli.endpoint.as_deref(), cli.insecure)?;
            commands::search::handle_search(&client, &data_dir, args).await?
        }
        Commands::Scan(args) => {
            let client = search_client(&config, cli.endpoint.as_deref(), cli.insecure)?;
            commands::search::handle_scan(&client, &data_dir, args).await?
        }
        Commands::Migrate { command } => {
            let client = search_client(&config, cli.endpoint.as_deref(), cli.insecure)?;
            commands::migrate::handle_migrate_command(client, command).await?
        }
    }

    Ok(())
}

fn search_client(config: &Config, endpoint: Option<&str>, insecure: bool) -> Result<SearchClient> {
    let search_config = config.search_config(endpoint, insecure)?;
    Ok(SearchClient::new(search_config)?)
}
