//! Outermost pipeline wrapper.
//!
//! `PipelineRun` owns exactly one execution: it creates the output root,
//! writes the start record, delegates to whichever executor was selected,
//! and always writes the finish record before returning, whether the
//! executor succeeded, reported a step failure, or errored out entirely.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::PipelineError;

use super::config::ConfigError;
use super::record::RunRecord;
use super::Executor;

/// One pipeline execution from start record to finish record.
pub struct PipelineRun {
    outdir: PathBuf,
    executor: Box<dyn Executor>,
    command_line: serde_json::Value,
}

impl PipelineRun {
    /// Wraps an executor for the given output root.
    ///
    /// `command_line` is the argument map persisted into the run record.
    pub fn new(
        outdir: impl Into<PathBuf>,
        executor: Box<dyn Executor>,
        command_line: serde_json::Value,
    ) -> Self {
        Self {
            outdir: outdir.into(),
            executor,
            command_line,
        }
    }

    /// Runs the pipeline and returns its terminal exit status.
    ///
    /// Fails fast, before creating anything, if no output root was set.
    /// The finish record is written on every path out of this function;
    /// when the executor errors, the recorded exit status is 2 and the
    /// error is propagated to the caller.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if the output root cannot be created, a step
    /// fails, or the executor reports a configuration error.
    pub fn run(&mut self) -> Result<i32, PipelineError> {
        if self.outdir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("outdir is not set".to_string()).into());
        }

        std::fs::create_dir_all(&self.outdir)?;

        let mut record = RunRecord::started(self.command_line.clone());
        record.write(&self.outdir)?;
        info!(outdir = %self.outdir.display(), run_id = %record.run_id, "Pipeline run started");

        let result = self.executor.run();

        match result {
            Ok(status) => {
                record.finish(status);
                record.write(&self.outdir)?;
                info!(status, "Pipeline run finished");
                Ok(status)
            }
            Err(e) => {
                record.finish(2);
                if let Err(write_err) = record.write(&self.outdir) {
                    // The original failure is the one worth surfacing.
                    warn!(error = %write_err, "Failed to write finish record");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::RUN_RECORD_FILE;
    use serde_json::json;

    struct CannedExecutor(Option<i32>);

    impl Executor for CannedExecutor {
        fn run(&mut self) -> Result<i32, PipelineError> {
            match self.0 {
                Some(code) => Ok(code),
                None => Err(PipelineError::StepFailed {
                    step: "ppi embedding".to_string(),
                    status: 1,
                }),
            }
        }
    }

    fn read_record(outdir: &std::path::Path) -> RunRecord {
        serde_json::from_str(&std::fs::read_to_string(outdir.join(RUN_RECORD_FILE)).unwrap())
            .unwrap()
    }

    #[test]
    fn test_unset_outdir_fails_before_creating_anything() {
        let mut run = PipelineRun::new(
            PathBuf::new(),
            Box::new(CannedExecutor(Some(0))),
            json!({}),
        );
        let result = run.run();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("outdir"));
    }

    #[test]
    fn test_creates_output_root_and_writes_records() {
        let temp = tempfile::tempdir().unwrap();
        let outdir = temp.path().join("run");
        let mut run = PipelineRun::new(
            &outdir,
            Box::new(CannedExecutor(Some(0))),
            json!({"fold": [1]}),
        );

        assert_eq!(run.run().unwrap(), 0);
        assert!(outdir.is_dir());

        let record = read_record(&outdir);
        assert_eq!(record.exit_status, Some(0));
        assert!(record.finish_time.is_some());
        assert_eq!(record.command_line["fold"][0], 1);
    }

    #[test]
    fn test_finish_record_written_when_executor_errors() {
        let temp = tempfile::tempdir().unwrap();
        let mut run = PipelineRun::new(temp.path(), Box::new(CannedExecutor(None)), json!({}));

        let err = run.run().unwrap_err();
        assert!(err.to_string().contains("ppi embedding"));

        let record = read_record(temp.path());
        assert_eq!(record.exit_status, Some(2));
        assert!(record.finish_time.is_some());
    }

    #[test]
    fn test_nonzero_executor_status_is_recorded() {
        let temp = tempfile::tempdir().unwrap();
        let mut run = PipelineRun::new(temp.path(), Box::new(CannedExecutor(Some(3))), json!({}));

        assert_eq!(run.run().unwrap(), 3);
        assert_eq!(read_record(temp.path()).exit_status, Some(3));
    }
}
