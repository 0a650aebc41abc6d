//! cellmaps-pipeline: orchestrator for the cell maps workflow.
//!
//! Coordinates the fixed five-stage pipeline (download inputs, embed,
//! co-embed, build a hierarchy, evaluate it) where each stage is an
//! external tool producing a directory of artifacts. Steps whose output
//! directory already exists are skipped, making runs resumable. The DAG can
//! be executed in-process or emitted as dependency-chained SLURM job
//! scripts.

pub mod cli;
pub mod collaborators;
pub mod error;
pub mod pipeline;

pub use error::PipelineError;
