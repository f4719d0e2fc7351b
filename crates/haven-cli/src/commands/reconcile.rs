//! Recompute lifecycle status fields for a population slice.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use haven_db::{Database, ReconcileScope};

/// Runs a status reconciliation sweep.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    scope: ReconcileScope,
    today: NaiveDate,
    progress_every: usize,
) -> Result<()> {
    let stats = db
        .reconcile_statuses(scope, today, |current, total| {
            if progress_every > 0 && current % progress_every == 0 && current < total {
                tracing::info!(current, total, "reconciling");
            }
        })
        .context("status reconciliation failed")?;

    writeln!(
        writer,
        "Reconciled {} of {} animal(s).",
        stats.updated, stats.examined
    )?;
    Ok(())
}
