//! Command-line interface for mathforge.
//!
//! Provides commands for running the full pipeline, replaying a single
//! stage, and reporting dataset metrics.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
