//! Semantic memory - the best-practices document

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::info;

use super::{read_optional, write_atomic, CnsLayout};

const BEST_PRACTICES_HEADER: &str = "# Best Practices\n";

/// Append a critical learning block to `best-practices.md`.
///
/// Creates the document when it does not exist yet. Returns `true` when the
/// file was newly created.
pub fn append_best_practice(layout: &CnsLayout, content: &str, now: DateTime<Local>) -> Result<bool> {
    let path = layout.best_practices_path();
    let existing = read_optional(&path)?;
    let created = existing.is_none();
    let base = existing.unwrap_or_else(|| BEST_PRACTICES_HEADER.to_string());

    let entry = format!(
        "\n## Critical Learning - {}\n**Source**: User \"Learn this:\" command\n\n{}\n\n---\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        content
    );

    write_atomic(&path, &format!("{}{}", base, entry))?;
    info!(
        "{} {} with new learning",
        if created { "Created" } else { "Updated" },
        path.display()
    );
    Ok(created)
}
