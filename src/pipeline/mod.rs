//! Pipeline orchestration core.
//!
//! Models the fixed cell-maps workflow as a DAG of named steps with data
//! dependencies, plus two interchangeable ways of executing it:
//!
//! - [`serial::SerialExecutor`] runs every step in-process, one at a time,
//!   skipping steps whose output directory already exists.
//! - [`slurm::SlurmScriptExecutor`] writes the same DAG out as a chain of
//!   SLURM job scripts with explicit `afterok` dependency edges.
//!
//! [`orchestrator::PipelineRun`] wraps either executor with output-root
//! creation and the start/finish run record.

pub mod command;
pub mod config;
pub mod orchestrator;
pub mod record;
pub mod serial;
pub mod slurm;
pub mod step;

use crate::error::PipelineError;

/// An execution strategy for the pipeline DAG.
///
/// Returns the run's terminal exit status: 0 only if every step succeeded
/// (or, for the script backend, once every script is on disk).
pub trait Executor {
    fn run(&mut self) -> Result<i32, PipelineError>;
}

pub use config::{PipelineConfig, SlurmDirectives};
pub use orchestrator::PipelineRun;
pub use serial::SerialExecutor;
pub use slurm::SlurmScriptExecutor;
