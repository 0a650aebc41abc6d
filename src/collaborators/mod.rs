//! Collaborator seam: the external tools that do the actual work.
//!
//! Each pipeline stage's real algorithm lives in a separate package invoked
//! through its command-line entry point. The orchestrator only needs one
//! capability from a stage: run it and get an exit status back. Keeping that
//! behind a trait means the executors can be exercised with stub
//! collaborators returning canned exit codes.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::pipeline::command::StageCommand;

/// A single external unit of work producing a directory of artifacts.
///
/// Returns the tool's exit status: 0 means success, any other value is an
/// opaque failure. The orchestrator never interprets non-zero codes.
pub trait Collaborator {
    fn run(&self) -> Result<i32, PipelineError>;
}

/// Collaborator that spawns a stage's command-line tool and waits for it.
///
/// Fully blocking: the pipeline never overlaps two stages, so there is
/// nothing to gain from spawning asynchronously.
#[derive(Debug)]
pub struct CommandCollaborator {
    command: StageCommand,
}

impl CommandCollaborator {
    /// Creates a collaborator for an already-built stage invocation.
    pub fn new(command: StageCommand) -> Self {
        Self { command }
    }
}

impl Collaborator for CommandCollaborator {
    fn run(&self) -> Result<i32, PipelineError> {
        info!(command = %self.command, "Invoking stage tool");
        let status = Command::new(&self.command.program)
            .args(&self.command.args)
            .status()?;
        // A signal-terminated child has no code; report it as failure.
        let code = status.code().unwrap_or(1);
        debug!(program = %self.command.program, code, "Stage tool exited");
        Ok(code)
    }
}

/// Collaborator that fabricates a stage's output instead of computing it.
///
/// Creates the output directory, drops a small JSON marker into it, and
/// returns a canned exit code. Backs the `--fake` flag and the executor
/// tests.
#[derive(Debug)]
pub struct FakeCollaborator {
    name: String,
    output_dir: PathBuf,
    exit_code: i32,
}

impl FakeCollaborator {
    /// Creates a fake collaborator that succeeds.
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            exit_code: 0,
        }
    }

    /// Sets the exit code the collaborator reports.
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// The directory this collaborator writes into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Collaborator for FakeCollaborator {
    fn run(&self) -> Result<i32, PipelineError> {
        info!(step = %self.name, outdir = %self.output_dir.display(), "Running fake stage");
        std::fs::create_dir_all(&self.output_dir)?;

        let marker = json!({
            "name": self.name,
            "generated_at": chrono::Utc::now().timestamp(),
            "fake": true,
        });
        let marker_path = self.output_dir.join("fake_step.json");
        std::fs::write(&marker_path, serde_json::to_string_pretty(&marker)?)?;

        Ok(self.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_collaborator_creates_output_dir_and_marker() {
        let temp = tempfile::tempdir().unwrap();
        let outdir = temp.path().join("1.image_download");
        let fake = FakeCollaborator::new("image download", &outdir);

        let code = fake.run().unwrap();
        assert_eq!(code, 0);
        assert!(outdir.is_dir());

        let marker: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(outdir.join("fake_step.json")).unwrap())
                .unwrap();
        assert_eq!(marker["name"], "image download");
        assert_eq!(marker["fake"], true);
    }

    #[test]
    fn test_fake_collaborator_canned_exit_code() {
        let temp = tempfile::tempdir().unwrap();
        let fake =
            FakeCollaborator::new("hierarchy", temp.path().join("4.hierarchy")).with_exit_code(3);
        assert_eq!(fake.run().unwrap(), 3);
    }

    #[test]
    fn test_command_collaborator_reports_exit_status() {
        let cmd = StageCommand {
            program: "false".to_string(),
            args: Vec::new(),
        };
        let code = CommandCollaborator::new(cmd).run().unwrap();
        assert_eq!(code, 1);

        let cmd = StageCommand {
            program: "true".to_string(),
            args: Vec::new(),
        };
        assert_eq!(CommandCollaborator::new(cmd).run().unwrap(), 0);
    }

    #[test]
    fn test_command_collaborator_missing_program_is_io_error() {
        let cmd = StageCommand {
            program: "cellmaps-no-such-tool".to_string(),
            args: Vec::new(),
        };
        let result = CommandCollaborator::new(cmd).run();
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
