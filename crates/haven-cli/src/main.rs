use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use haven_cli::commands::{init, recode, recompute, reconcile, status};
use haven_cli::{Cli, Commands, Config};

/// Load config and open the database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(haven_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = haven_db::Database::open(&config.database_path)
        .context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: the subscriber may already be installed under a test harness.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let today = chrono::Local::now().date_naive();
    let mut stdout = io::stdout();

    match &cli.command {
        Some(Commands::Init) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            init::run(&mut stdout, &config)?;
        }
        Some(Commands::Reconcile { scope }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            reconcile::run(&mut stdout, &mut db, (*scope).into(), today, config.progress_every)?;
        }
        Some(Commands::Recompute { scope }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            recompute::run(&mut stdout, &mut db, (*scope).into(), today, config.progress_every)?;
        }
        Some(Commands::Recode { target }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            recode::run(&mut stdout, &mut db, (*target).into(), today, config.progress_every)?;
        }
        Some(Commands::Status) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            status::run(&mut stdout, &config)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
