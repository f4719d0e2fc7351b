//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use haven_db::{RecodeScope, ReconcileScope};

/// Shelter lifecycle maintenance tool.
///
/// Recomputes the denormalized status and time-in-care fields that the rest
/// of the shelter application reads.
#[derive(Debug, Parser)]
#[command(name = "haven", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database and report its location.
    Init,

    /// Recompute lifecycle status fields for a population slice.
    Reconcile {
        /// Which animals to sweep.
        #[arg(long, value_enum, default_value_t = SweepScope::All)]
        scope: SweepScope,
    },

    /// Recompute time-in-care and age fields for a population slice.
    Recompute {
        /// Which animals to sweep.
        #[arg(long, value_enum, default_value_t = SweepScope::All)]
        scope: SweepScope,
    },

    /// Clear and regenerate identifying codes.
    Recode {
        /// Which animals to recode.
        #[arg(long, value_enum, default_value_t = RecodeTarget::All)]
        target: RecodeTarget,
    },

    /// Show population counts.
    Status,
}

/// Population slices a sweep can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepScope {
    /// Every animal on file.
    All,
    /// Animals on premises or returned since yesterday.
    OnShelter,
    /// Animals off premises via an active foster.
    Foster,
}

impl From<SweepScope> for ReconcileScope {
    fn from(scope: SweepScope) -> Self {
        match scope {
            SweepScope::All => Self::All,
            SweepScope::OnShelter => Self::OnShelter,
            SweepScope::Foster => Self::Foster,
        }
    }
}

/// Record sets a recode can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecodeTarget {
    /// Every animal on file.
    All,
    /// Animals currently on premises.
    OnShelter,
}

impl From<RecodeTarget> for RecodeScope {
    fn from(target: RecodeTarget) -> Self {
        match target {
            RecodeTarget::All => Self::All,
            RecodeTarget::OnShelter => Self::OnShelter,
        }
    }
}
