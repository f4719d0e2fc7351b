//! Shelter lifecycle engine CLI library.
//!
//! This crate provides the maintenance command surface for the engine:
//! reconciliation sweeps, care recomputation, code reassignment and a status
//! summary, the entry points a scheduled-job runner invokes.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, RecodeTarget, SweepScope};
pub use config::Config;
