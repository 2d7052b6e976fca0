//! One-shot crawl command.

use console::style;

use crate::cli::helpers::{build_engine, truncate};
use crate::config::Settings;
use crate::services::orchestrator::RunSummary;

/// Crawl the configured cities once and print a summary.
pub async fn cmd_run(
    mut settings: Settings,
    cities: &[String],
    pacing: Option<f64>,
) -> anyhow::Result<()> {
    if !cities.is_empty() {
        let wanted: Vec<String> = cities.iter().map(|c| c.to_lowercase()).collect();
        settings
            .cities
            .retain(|c| wanted.contains(&c.name.to_lowercase()));
        if settings.cities.is_empty() {
            anyhow::bail!("None of the requested cities are configured: {}", cities.join(", "));
        }
    }
    if let Some(scale) = pacing {
        settings.pacing_scale = scale.max(0.0);
    }

    println!(
        "{} Crawling {} cities (data in {})",
        style("→").cyan(),
        settings.cities.len(),
        settings.data_dir.display()
    );

    let engine = build_engine(&settings)?;
    let summary = engine.run_once().await?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", style("Run Summary").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<18} {:>9} {:>6} {:>10} {:>6} {:>5}  Stop",
        "City", "Processed", "Leads", "Delivered", "Chkpt", "Err"
    );
    println!("{}", "-".repeat(78));

    for city in &summary.cities {
        let stop = city
            .stop_reason
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<18} {:>9} {:>6} {:>10} {:>6} {:>5}  {}",
            truncate(&city.city, 18),
            city.ads_processed,
            city.leads_found,
            city.leads_delivered,
            city.checkpoints,
            city.errors,
            stop
        );
    }

    let totals = summary.totals();
    println!("{}", "-".repeat(78));
    println!(
        "{:<18} {:>9} {:>6} {:>10} {:>6} {:>5}",
        style("Total").bold(),
        totals.ads_processed,
        totals.leads_found,
        totals.leads_delivered,
        totals.checkpoints,
        totals.errors
    );
    println!(
        "\n{} Finished in {}s, {} leads known",
        style("✓").green(),
        summary.duration_secs(),
        summary.seen_leads
    );
}
