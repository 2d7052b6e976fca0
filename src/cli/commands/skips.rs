//! Security skip table commands.

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Settings;

/// List skipped links with their checkpoint hit counts.
pub fn cmd_skips_list(settings: &Settings) -> anyhow::Result<()> {
    let skips = settings.ledger().load_skips();
    let ceiling = settings.limits.security_max_hits;

    if skips.is_empty() {
        println!("{} Skip table is empty", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Security Checkpoints").bold());
    println!("{}", "-".repeat(80));
    println!("{:>4}  {:<8} Link", "Hits", "Skipped");
    println!("{}", "-".repeat(80));

    for (link, hits) in skips.entries() {
        let skipped = if skips.is_skipped(link, ceiling) {
            style("yes").red().to_string()
        } else {
            "no".to_string()
        };
        println!("{:>4}  {:<8} {}", hits, skipped, truncate(link, 64));
    }

    println!("\n{} entries in {}", skips.len(), skips.path().display());
    Ok(())
}

/// Reset one link, or the whole table.
pub fn cmd_skips_reset(settings: &Settings, link: Option<&str>) -> anyhow::Result<()> {
    let mut skips = settings.ledger().load_skips();
    let removed = skips.reset(link);

    if removed == 0 {
        match link {
            Some(link) => println!("{} {} is not in the skip table", style("!").yellow(), link),
            None => println!("{} Skip table is already empty", style("!").yellow()),
        }
        return Ok(());
    }

    settings.ensure_directories()?;
    skips.save()?;
    println!("{} Removed {} entries", style("✓").green(), removed);
    Ok(())
}
