//! The `extract` command: offline extraction from a saved results page.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use console::style;

use zipcrawl::config::Config;
use zipcrawl::crawl::TargetCrawler;
use zipcrawl::models::Target;
use zipcrawl::storage::OutputWriter;
use zipcrawl::CrawlError;

pub async fn cmd_extract(
    config: &Config,
    base_dir: &Path,
    file: &Path,
    target: Option<String>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let settings = config.settings(base_dir)?;
    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let crawler = TargetCrawler::new(settings.site)?;
    let extract = match crawler.extract(&html) {
        Ok(extract) => extract,
        Err(CrawlError::Blocked { title, .. }) => {
            eprintln!(
                "{} {} looks like a block page ({})",
                style("✗").red(),
                file.display(),
                title
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("No listings payload in {}", file.display()));
        }
    };

    eprintln!(
        "{} {} listings ({} raw), {} page(s) of results",
        style("✓").green(),
        extract.listings.len(),
        extract.raw_count,
        extract.total_pages
    );

    match target {
        Some(target) => {
            let writer = OutputWriter::new(output_dir.unwrap_or(settings.output_dir));
            let path = writer.write_target(&Target::new(target), &extract.listings)?;
            eprintln!("  {} {}", style("Saved →").dim(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&extract.listings)?),
    }

    Ok(ExitCode::SUCCESS)
}
