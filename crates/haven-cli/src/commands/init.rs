//! Create and initialize the database.

use std::io::Write;

use anyhow::{Context, Result};
use haven_db::Database;

use crate::Config;

/// Creates the database file (and its schema) at the configured path.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    writeln!(writer, "Database ready: {}", config.database_path.display())?;
    Ok(())
}
