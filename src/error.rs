//! Error types for pipeline orchestration.
//!
//! The pipeline distinguishes three failure classes:
//! - configuration errors, raised before any I/O happens,
//! - step failures, where an external tool returned a non-zero exit status,
//! - filesystem errors while managing the output root or generated scripts.

use thiserror::Error;

use crate::pipeline::config::ConfigError;

/// Errors that can occur while running or generating a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An external step tool returned a non-zero exit status.
    ///
    /// The status is opaque: the orchestrator makes no distinction between
    /// transient and fatal codes and never retries.
    #[error("{step} failed with exit status {status}")]
    StepFailed { step: String, status: i32 },

    /// IO error while touching the output root or writing scripts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_display() {
        let err = PipelineError::StepFailed {
            step: "image download".to_string(),
            status: 3,
        };
        assert_eq!(err.to_string(), "image download failed with exit status 3");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: PipelineError = ConfigError::Missing("outdir".to_string()).into();
        assert!(err.to_string().contains("outdir"));
        assert!(err.to_string().contains("Configuration error"));
    }
}
