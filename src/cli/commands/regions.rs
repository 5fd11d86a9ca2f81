//! The `regions` command.

use std::process::ExitCode;

use console::style;

use zipcrawl::regions;

pub async fn cmd_regions() -> anyhow::Result<ExitCode> {
    for region in regions::ALL {
        println!(
            "{} {} - {} ({} targets)",
            style("→").cyan(),
            style(region.label).bold(),
            region.description,
            region.zipcodes.len()
        );
        println!("  {}", region.zipcodes.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}
