//! Status command for showing population counts.

use std::io::Write;

use anyhow::{Context, Result};
use haven_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let counts = db.shelter_counts()?;

    writeln!(writer, "Shelter status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Animals on file: {}", counts.total)?;
    writeln!(writer, "On shelter: {}", counts.on_shelter)?;
    writeln!(writer, "On foster: {}", counts.on_foster)?;
    writeln!(writer, "With active reserve: {}", counts.reserved)?;

    Ok(())
}
