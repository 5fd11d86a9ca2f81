//! The `summary` command.

use std::path::Path;
use std::process::ExitCode;

use console::style;

use zipcrawl::storage::DatasetSummary;

pub fn print_summary(summary: &DatasetSummary) {
    println!("{}", style("Dataset summary").bold());
    println!("  Listings:  {}", summary.count);

    if let (Some(min), Some(max)) = (summary.price_min, summary.price_max) {
        println!("  Price:     ${} - ${}", min, max);
    }
    if let Some(median) = summary.price_median {
        println!("  Median:    ${:.0}", median);
    }

    if !summary.home_types.is_empty() {
        println!("  Home types:");
        for (home_type, count) in &summary.home_types {
            println!("    {:<20} {}", home_type, count);
        }
    }
    if !summary.statuses.is_empty() {
        println!("  Statuses:");
        for (status, count) in &summary.statuses {
            println!("    {:<20} {}", status, count);
        }
    }
}

pub async fn cmd_summary(file: &Path) -> anyhow::Result<ExitCode> {
    let summary = DatasetSummary::load(file)?;
    print_summary(&summary);
    Ok(ExitCode::SUCCESS)
}
