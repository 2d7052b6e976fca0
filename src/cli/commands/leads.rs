//! Lead store inspection.

use console::style;

use crate::config::Settings;

/// Print the most recent leads as pretty JSON.
pub fn cmd_leads(settings: &Settings, limit: Option<usize>) -> anyhow::Result<()> {
    let ledger = settings.ledger();
    let leads = ledger.leads.read_all()?;

    if leads.is_empty() {
        eprintln!(
            "{} No leads in {}",
            style("!").yellow(),
            ledger.leads.path().display()
        );
        return Ok(());
    }

    let skip = limit.map_or(0, |n| leads.len().saturating_sub(n));
    let shown = &leads[skip..];
    println!("{}", serde_json::to_string_pretty(shown)?);
    eprintln!(
        "{} {} of {} leads",
        style("✓").green(),
        shown.len(),
        leads.len()
    );

    Ok(())
}
