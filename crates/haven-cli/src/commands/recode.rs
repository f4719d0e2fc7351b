//! Clear and regenerate identifying codes.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use haven_db::{Database, RecodeScope};

/// Reassigns codes for the selected records.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    scope: RecodeScope,
    today: NaiveDate,
    progress_every: usize,
) -> Result<()> {
    let recoded = db
        .reassign_codes(scope, today, |current, total| {
            if progress_every > 0 && current % progress_every == 0 && current < total {
                tracing::info!(current, total, "reassigning codes");
            }
        })
        .context("code reassignment failed")?;

    writeln!(writer, "Reassigned codes for {recoded} animal(s).")?;
    Ok(())
}
