//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod extract;
mod regions;
mod summary;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use zipcrawl::config::Config;

#[derive(Parser)]
#[command(name = "zipcrawl")]
#[command(about = "Resilient multi-target listing crawler")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every target through one browser session and merge the results
    Crawl(crawl::CrawlArgs),

    /// Extract listings from a saved results page (no browser)
    Extract {
        /// Saved HTML page
        file: PathBuf,
        /// Write the listings as this target's snapshot instead of printing them
        #[arg(short, long)]
        target: Option<String>,
        /// Output directory for --target snapshots
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Summarize a per-target or merged listings file
    Summary {
        /// Listings JSON file
        file: PathBuf,
    },

    /// List built-in target regions
    Regions,
}

/// Load config from an explicit path or by discovery.
async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::load().await),
    }
}

/// Directory that relative config paths resolve against.
fn base_dir(config: &Config) -> PathBuf {
    config
        .base_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => {
            let config = load_config(cli.config.as_deref()).await?;
            crawl::cmd_crawl(&config, &base_dir(&config), args).await
        }
        Commands::Extract {
            file,
            target,
            output_dir,
        } => {
            let config = load_config(cli.config.as_deref()).await?;
            extract::cmd_extract(&config, &base_dir(&config), &file, target, output_dir).await
        }
        Commands::Summary { file } => summary::cmd_summary(&file).await,
        Commands::Regions => regions::cmd_regions().await,
    }
}
