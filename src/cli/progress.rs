//! Console rendering of crawl events.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use zipcrawl::crawl::CrawlEvent;

/// Prints crawl events as they arrive. Waits are shown as a spinner that
/// clears when the next event comes in.
#[derive(Default)]
struct CrawlProgress {
    spinner: Option<ProgressBar>,
}

impl CrawlProgress {
    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn wait_spinner(&mut self, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn handle(&mut self, event: CrawlEvent) {
        self.clear_spinner();

        match event {
            CrawlEvent::Warming { url } => {
                println!("{} Warming up session at {}", style("→").cyan(), url);
            }
            CrawlEvent::WarmupBlocked { title } => {
                println!(
                    "{} Warm-up page looks blocked: {}",
                    style("✗").red(),
                    style(title).dim()
                );
            }
            CrawlEvent::TargetStarted {
                target,
                index,
                total,
            } => {
                println!();
                println!(
                    "{} [{}/{}] Crawling {}",
                    style("→").cyan(),
                    index + 1,
                    total,
                    style(target).bold()
                );
            }
            CrawlEvent::PageFetched {
                target: _,
                page,
                title,
            } => {
                println!("  Page {}: {}", page, style(title).dim());
            }
            CrawlEvent::NavigationFailed { page, error, .. } => {
                println!("  {} Page {}: {}", style("✗").red(), page, error);
            }
            CrawlEvent::PageBlocked { page, title, .. } => {
                println!(
                    "  {} Page {} blocked ({})",
                    style("✗").red(),
                    page,
                    style(title).dim()
                );
            }
            CrawlEvent::PayloadMissing { page, .. } => {
                println!(
                    "  {} Page {}: no listings payload",
                    style("!").yellow(),
                    page
                );
            }
            CrawlEvent::PageLimit {
                total_pages,
                max_pages,
                ..
            } => {
                println!(
                    "  {} page(s) of results, crawling up to {}",
                    total_pages, max_pages
                );
            }
            CrawlEvent::PageAdmitted {
                page, found, new, ..
            } => {
                println!(
                    "  {} Page {}: {} listings, {} new",
                    style("✓").green(),
                    page,
                    found,
                    new
                );
            }
            CrawlEvent::TargetFinished(outcome) => {
                if outcome.accepted_count > 0 {
                    println!(
                        "{} {}: {} new unique listings",
                        style("✓").green(),
                        outcome.target,
                        outcome.accepted_count
                    );
                } else {
                    println!(
                        "{} {}: no listings ({})",
                        style("✗").red(),
                        outcome.target,
                        outcome.coverage
                    );
                }
            }
            CrawlEvent::SnapshotWritten { path, .. } => {
                println!("  {} {}", style("Saved →").dim(), path.display());
            }
            CrawlEvent::Waiting { pause, duration } => {
                self.wait_spinner(format!(
                    "Waiting {:.1}s ({})",
                    duration.as_secs_f64(),
                    pause
                ));
            }
            CrawlEvent::Recovering {
                attempt,
                max_attempts,
            } => {
                println!();
                println!(
                    "{} Possible block detected, recovery attempt {}/{}",
                    style("!").yellow(),
                    attempt,
                    max_attempts
                );
                println!(
                    "  {} If running with --headful, solve any challenge in the browser window now",
                    style("→").dim()
                );
            }
        }
    }
}

/// Spawn the event printer. It exits once every sender is dropped.
pub fn spawn_printer(mut rx: mpsc::Receiver<CrawlEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut progress = CrawlProgress::default();
        while let Some(event) = rx.recv().await {
            progress.handle(event);
        }
        progress.clear_spinner();
    })
}
