//! Offline extraction and time parsing.

use std::path::Path;

use anyhow::Context;
use chrono::Local;
use console::style;

use crate::extract::{extract_listing, Extraction};
use crate::models::{ListingRecord, CREATION_TIME_FORMAT};
use crate::services::relative_time::{parse_relative_offset, parse_relative_time};

/// Run the extraction pipeline on a saved listing page.
pub fn cmd_extract(file: &Path, city: &str) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let now = Local::now();
    let link = format!("file://{}", file.display());

    match extract_listing(&html, now) {
        Extraction::Blocked => {
            println!(
                "{} Page is a security checkpoint",
                style("✗").red()
            );
        }
        Extraction::Fields(fields) => {
            let mut record = ListingRecord::new(city, &link);
            fields.apply_to(&mut record, now);
            println!("{}", serde_json::to_string_pretty(&record)?);
            if record.title_looks_bad {
                eprintln!("{} Title looks bad", style("!").yellow());
            }
        }
    }

    Ok(())
}

/// Print what the relative-time parser makes of `text`.
pub fn cmd_parse_time(text: &str) {
    let now = Local::now();
    match (parse_relative_offset(text), parse_relative_time(text, now)) {
        (Some(offset), Some(at)) => {
            println!(
                "{} {} minutes ago ({})",
                style("✓").green(),
                offset.num_minutes(),
                at.format(CREATION_TIME_FORMAT)
            );
        }
        _ => println!("{} No relative time found", style("✗").red()),
    }
}
