//! Command-line interface for the cell maps pipeline.
//!
//! Exposes the single pipeline command: parse arguments, build the run
//! configuration, pick the executor, and run it.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
