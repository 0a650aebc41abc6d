//! Run record written to the output root.
//!
//! One JSON object per run, written at start and overwritten at finish, so
//! the output directory is self-describing after any run, clean or crashed.
//! The record is audit-only: the orchestrator never reads it back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Name of the record file inside the output root.
pub const RUN_RECORD_FILE: &str = "run_record.json";

/// Start/finish marker of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Start time, epoch seconds.
    pub start_time: i64,
    /// Finish time, epoch seconds; unset while the run is in flight.
    pub finish_time: Option<i64>,
    /// Terminal exit status; unset while the run is in flight.
    pub exit_status: Option<i32>,
    /// Full command-line argument map the run was invoked with.
    pub command_line: serde_json::Value,
}

impl RunRecord {
    /// Creates a start record stamped with the current time.
    pub fn started(command_line: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            start_time: chrono::Utc::now().timestamp(),
            finish_time: None,
            exit_status: None,
            command_line,
        }
    }

    /// Stamps the finish time and exit status.
    pub fn finish(&mut self, exit_status: i32) {
        self.finish_time = Some(chrono::Utc::now().timestamp());
        self.exit_status = Some(exit_status);
    }

    /// Writes the record into the output root, replacing any earlier write.
    pub fn write(&self, outdir: &Path) -> Result<(), PipelineError> {
        let path = outdir.join(RUN_RECORD_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
