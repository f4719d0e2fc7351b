//! Recompute time-in-care and age fields for a population slice.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use haven_db::{Database, ReconcileScope};

/// Runs a care-field recomputation sweep.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    scope: ReconcileScope,
    today: NaiveDate,
    progress_every: usize,
) -> Result<()> {
    let stats = db
        .recompute_care(scope, today, |current, total| {
            if progress_every > 0 && current % progress_every == 0 && current < total {
                tracing::info!(current, total, "recomputing care fields");
            }
        })
        .context("care recomputation failed")?;

    writeln!(
        writer,
        "Updated care fields for {} of {} animal(s).",
        stats.updated, stats.examined
    )?;
    Ok(())
}
