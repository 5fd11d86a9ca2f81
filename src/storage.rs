//! Output files: per-target snapshots, the merged run dataset, debug HTML
//! dumps, and the dataset summary read back from those files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::crawl::{FinalState, RunReport};
use crate::error::{CrawlError, CrawlResult};
use crate::models::{Coverage, NormalizedListing, Target};

/// Per-target snapshot record.
#[derive(Debug, Serialize)]
pub struct TargetOutput<'a> {
    pub target: &'a Target,
    pub total_listings: usize,
    pub scraped_at: String,
    pub listings: &'a [NormalizedListing],
}

/// Merged run record. `total_listings == listings.len()`.
#[derive(Debug, Serialize)]
pub struct MergedOutput<'a> {
    pub region_label: &'a str,
    pub scraped_at: String,
    pub final_state: FinalState,
    pub targets: &'a [Target],
    pub total_listings: usize,
    pub per_target: BTreeMap<String, usize>,
    pub coverage: BTreeMap<String, Coverage>,
    pub listings: &'a [NormalizedListing],
}

impl<'a> MergedOutput<'a> {
    pub fn from_report(report: &'a RunReport) -> Self {
        Self {
            region_label: &report.region_label,
            scraped_at: Local::now().format("%Y-%m-%d").to_string(),
            final_state: report.final_state,
            targets: &report.targets,
            total_listings: report.listings.len(),
            per_target: report.per_target(),
            coverage: report
                .outcomes
                .iter()
                .map(|o| (o.target.to_string(), o.coverage))
                .collect(),
            listings: &report.listings,
        }
    }
}

/// Writes pretty-printed JSON outputs under one directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    mirror: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mirror: None,
        }
    }

    /// Also copy the merged dataset to `path` when its directory exists.
    pub fn with_mirror(mut self, path: Option<PathBuf>) -> Self {
        self.mirror = path;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn target_path(&self, target: &Target) -> PathBuf {
        self.dir
            .join(format!("listings_{}.json", sanitize_component(target.as_str())))
    }

    pub fn merged_path(&self, region_label: &str) -> PathBuf {
        self.dir
            .join(format!("{}_listings.json", sanitize_component(region_label)))
    }

    pub fn write_target(
        &self,
        target: &Target,
        listings: &[NormalizedListing],
    ) -> CrawlResult<PathBuf> {
        let record = TargetOutput {
            target,
            total_listings: listings.len(),
            scraped_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            listings,
        };
        let path = self.target_path(target);
        write_json(&path, &record)?;
        debug!("Saved {} listings to {}", listings.len(), path.display());
        Ok(path)
    }

    pub fn write_merged(&self, report: &RunReport) -> CrawlResult<PathBuf> {
        let record = MergedOutput::from_report(report);
        let path = self.merged_path(&report.region_label);
        write_json(&path, &record)?;
        info!(
            "Saved {} merged listings to {}",
            record.total_listings,
            path.display()
        );

        if let Some(ref mirror) = self.mirror {
            match mirror.parent() {
                Some(parent) if parent.as_os_str().is_empty() || parent.exists() => {
                    write_json(mirror, &record)?;
                    info!("Copied merged dataset to {}", mirror.display());
                }
                _ => debug!(
                    "Mirror directory for {} does not exist, skipping",
                    mirror.display()
                ),
            }
        }

        Ok(path)
    }
}

/// Save fetched page HTML as `{dir}/{target}_p{page}.html`.
pub fn write_html_dump(
    dir: &Path,
    target: &Target,
    page: u32,
    html: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}_p{}.html",
        sanitize_component(target.as_str()),
        page
    ));
    std::fs::write(&path, html)?;
    Ok(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CrawlResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Keep file names to a safe character set.
fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Aggregate view of a listings dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub count: usize,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub price_median: Option<f64>,
    pub home_types: BTreeMap<String, usize>,
    pub statuses: BTreeMap<String, usize>,
}

impl DatasetSummary {
    pub fn from_listings<'a>(listings: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut summary = Self::default();
        let mut prices = Vec::new();

        for listing in listings {
            summary.count += 1;

            if let Some(price) = listing.get("price").and_then(numeric_price) {
                prices.push(price);
            }

            let home_type = listing
                .get("homeType")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            *summary.home_types.entry(home_type.to_string()).or_default() += 1;

            let status = ["homeStatus", "statusText"]
                .iter()
                .filter_map(|k| listing.get(*k).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .unwrap_or("Unknown");
            *summary.statuses.entry(status.to_string()).or_default() += 1;
        }

        prices.sort_unstable();
        summary.price_min = prices.first().copied();
        summary.price_max = prices.last().copied();
        summary.price_median = median(&prices);
        summary
    }

    pub fn from_normalized(listings: &[NormalizedListing]) -> Self {
        let values: Vec<Value> = listings
            .iter()
            .map(|l| Value::Object(l.fields().clone()))
            .collect();
        Self::from_listings(&values)
    }

    /// Summarize a per-target or merged output file (or a bare array).
    pub fn load(path: &Path) -> CrawlResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&text)?;
        let listings = match &doc {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("listings") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(CrawlError::PayloadNotFound(format!(
                        "{} has no listings array",
                        path.display()
                    )))
                }
            },
            _ => {
                return Err(CrawlError::PayloadNotFound(format!(
                    "{} is not a listings file",
                    path.display()
                )))
            }
        };
        Ok(Self::from_listings(listings))
    }
}

fn numeric_price(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn median(sorted: &[i64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2] as f64)
    } else {
        Some((sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0)
    }
}
