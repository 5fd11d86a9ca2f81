//! The `crawl` command.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use zipcrawl::browser::BrowserSession;
use zipcrawl::config::{Config, Settings};
use zipcrawl::crawl::{
    CrawlEvent, CrawlOrchestrator, EventSink, FinalState, Pacer, RunReport, TargetCrawler,
    TokioClock,
};
use zipcrawl::models::{Coverage, Target};
use zipcrawl::regions;
use zipcrawl::storage::{DatasetSummary, OutputWriter};

use super::summary::print_summary;
use crate::cli::progress::spawn_printer;

#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
    /// Comma-separated targets (e.g. 75071,75070); defaults to the region's list
    #[arg(long)]
    pub targets: Option<String>,
    /// Built-in region to crawl
    #[arg(short, long)]
    pub region: Option<String>,
    /// Maximum pages per target (at least 1)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,
    /// Show the browser window (needed for solving challenges by hand)
    #[arg(long)]
    pub headful: bool,
    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Save every fetched page's HTML into this directory
    #[arg(long)]
    pub dump_html: Option<PathBuf>,
}

impl CrawlArgs {
    /// Apply command-line overrides on top of config-derived settings.
    fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        if let Some(ref label) = self.region {
            let region = regions::find(label).with_context(|| {
                format!("Unknown region '{}' (see `zipcrawl regions`)", label)
            })?;
            settings.region_label = region.label.to_string();
            settings.targets = region.targets();
        }
        if let Some(ref targets) = self.targets {
            let targets = Target::parse_list(targets);
            if targets.is_empty() {
                anyhow::bail!("--targets must name at least one target");
            }
            settings.targets = targets;
        }
        if let Some(max_pages) = self.max_pages {
            if max_pages == 0 {
                anyhow::bail!("--max-pages must be at least 1");
            }
            settings.max_pages = max_pages;
        }
        if self.headful {
            settings.browser.headless = false;
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(ref dir) = self.dump_html {
            settings.dump_html = Some(dir.clone());
        }
        Ok(())
    }
}

pub async fn cmd_crawl(
    config: &Config,
    base_dir: &Path,
    args: CrawlArgs,
) -> anyhow::Result<ExitCode> {
    let mut settings = config.settings(base_dir)?;
    args.apply(&mut settings)?;

    println!(
        "{} Crawling {} target(s) in region {}, up to {} pages each",
        style("→").cyan(),
        settings.targets.len(),
        style(&settings.region_label).bold(),
        settings.max_pages
    );
    if !settings.browser.headless {
        println!(
            "  {} Browser window is visible; solve any challenge it shows",
            style("→").dim()
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "\n{} Interrupted, writing what was collected so far",
                    style("!").yellow()
                );
                cancel.cancel();
            }
        })
    };

    let session = BrowserSession::open(&settings.browser)
        .await
        .context("Failed to start browser session")?;
    let crawler = TargetCrawler::new(settings.site.clone())?
        .with_wait_policy(settings.browser.wait_until)
        .with_nav_timeout(settings.nav_timeout())
        .with_html_dump(settings.dump_html.clone());
    let pacer = Pacer::new(settings.pacing.clone(), Arc::new(TokioClock), cancel.clone());
    let writer = OutputWriter::new(&settings.output_dir).with_mirror(settings.mirror_path.clone());

    let (event_tx, event_rx) = mpsc::channel::<CrawlEvent>(100);
    let printer = spawn_printer(event_rx);

    let report = CrawlOrchestrator::new(session, crawler, pacer)
        .with_events(EventSink::new(event_tx))
        .with_recovery(settings.recovery)
        .with_max_pages(settings.max_pages)
        .with_region_label(settings.region_label.clone())
        .with_output(writer)
        .run(&settings.targets)
        .await
        .context("Failed to write crawl output")?;

    if let Err(e) = printer.await {
        tracing::warn!("Event printer task failed: {}", e);
    }
    ctrl_c.abort();

    print_report(&report);
    Ok(ExitCode::from(report.exit_code()))
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", style("Per-target breakdown").bold());
    for outcome in &report.outcomes {
        let coverage = match outcome.coverage {
            Coverage::Complete => style(outcome.coverage.to_string()).green(),
            Coverage::Partial => style(outcome.coverage.to_string()).yellow(),
            _ => style(outcome.coverage.to_string()).red(),
        };
        println!(
            "  {:<8} {:>5} listings  {:>3} page(s)  {}",
            outcome.target, outcome.accepted_count, outcome.pages_fetched, coverage
        );
    }

    let flagged: Vec<String> = report.flagged().map(|o| o.target.to_string()).collect();
    if !flagged.is_empty() {
        println!(
            "  {} Zero or partial coverage: {}",
            style("!").yellow(),
            flagged.join(", ")
        );
    }

    if !report.listings.is_empty() {
        println!();
        print_summary(&DatasetSummary::from_normalized(&report.listings));
    }

    println!();
    println!(
        "  TOTAL: {} unique listings across {} target(s)",
        report.total_listings(),
        report.targets.len()
    );
    if let Some(ref path) = report.merged_path {
        println!("  {} {}", style("Saved →").dim(), path.display());
    }

    match report.final_state {
        FinalState::Done => println!("{} Crawl complete", style("✓").green()),
        FinalState::Aborted | FinalState::Cancelled => {
            if let Some(err) = report.error() {
                println!("{} {}", style("✗").red(), err);
            }
        }
    }
}
