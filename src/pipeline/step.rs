//! Step descriptions, fold fan-out, and the completion probe.
//!
//! The pipeline DAG is fixed: it is never built from user input, only
//! parameterized by the fold list. This module holds the static pieces the
//! executors share: the step directory names, the pure-data `StepSpec`, the
//! per-fold branch expansion, and the directory-existence probe that drives
//! resumability.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::config::ConfigError;

/// Directory name of the image download step.
pub const IMAGE_DOWNLOAD_DIR: &str = "1.image_download";
/// Directory name of the PPI download step.
pub const PPI_DOWNLOAD_DIR: &str = "1.ppi_download";
/// Directory name of the PPI embedding step.
pub const PPI_EMBEDDING_DIR: &str = "1.ppi_embedding";
/// Directory name prefix of the per-fold image embedding step.
pub const IMAGE_EMBEDDING_DIR_PREFIX: &str = "2.image_embedding_fold";
/// Directory name prefix of the per-fold coembedding step.
pub const COEMBEDDING_DIR_PREFIX: &str = "3.coembedding_fold";
/// Directory name of the hierarchy step.
pub const HIERARCHY_DIR: &str = "4.hierarchy";
/// Directory name of the hierarchy evaluation step.
pub const HIERARCHYEVAL_DIR: &str = "4.hierarchyeval";

/// Static description of one pipeline step. Pure data, no behavior.
///
/// `inputs` reference either the run's external input files or another
/// step's output directory; `output_dir` is unique across all steps of a
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Human-readable step name, used in logs and failure messages.
    pub name: String,
    /// Directory this step writes all of its artifacts into.
    pub output_dir: PathBuf,
    /// Directories or files this step reads from.
    pub inputs: Vec<PathBuf>,
    /// Whether an existing output directory means the step is complete.
    pub skip_if_exists: bool,
}

impl StepSpec {
    /// Creates a step spec with `skip_if_exists` enabled.
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            inputs: Vec::new(),
            skip_if_exists: true,
        }
    }

    /// Adds an input path.
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }
}

/// One parallel branch through the image embedding and coembedding stages.
///
/// Computed once from the output root and the fold id, immutable afterwards
/// and never persisted; it is recomputable from `(outdir, fold)` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldBranch {
    /// Fold identifier, embedded in directory and job names.
    pub fold: u32,
    /// `outdir/2.image_embedding_fold<fold>`
    pub image_embed_dir: PathBuf,
    /// `outdir/3.coembedding_fold<fold>`
    pub coembed_dir: PathBuf,
}

/// Expands the fold list into one branch per fold, preserving input order.
///
/// Duplicate fold values would collide in directory and job names; the fold
/// list is assumed deduplicated and this is not defended against.
///
/// # Errors
///
/// Returns `ConfigError` if the fold list is empty.
pub fn expand_folds(outdir: &Path, folds: &[u32]) -> Result<Vec<FoldBranch>, ConfigError> {
    if folds.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "fold cannot be empty".to_string(),
        ));
    }

    Ok(folds
        .iter()
        .map(|&fold| FoldBranch {
            fold,
            image_embed_dir: outdir.join(format!("{IMAGE_EMBEDDING_DIR_PREFIX}{fold}")),
            coembed_dir: outdir.join(format!("{COEMBEDDING_DIR_PREFIX}{fold}")),
        })
        .collect())
}

/// Decides whether a step's output already exists and the step can be
/// skipped.
///
/// Directory existence is the sole resumability signal: an existing
/// directory is treated as a completed step regardless of its content, so a
/// step that crashed mid-write reads as complete until its directory is
/// removed. The trait keeps executors testable with stub probes.
pub trait DirectoryProbe {
    /// Returns true iff the step's output directory exists as a directory.
    fn is_complete(&self, step: &StepSpec) -> bool;
}

/// Filesystem-backed probe used outside of tests.
#[derive(Debug, Default)]
pub struct FsDirectoryProbe;

impl DirectoryProbe for FsDirectoryProbe {
    fn is_complete(&self, step: &StepSpec) -> bool {
        step.output_dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_spec_builder() {
        let step = StepSpec::new("ppi embedding", "/run/1.ppi_embedding")
            .with_input("/run/1.ppi_download");
        assert_eq!(step.name, "ppi embedding");
        assert_eq!(step.output_dir, PathBuf::from("/run/1.ppi_embedding"));
        assert_eq!(step.inputs, vec![PathBuf::from("/run/1.ppi_download")]);
        assert!(step.skip_if_exists);
    }

    #[test]
    fn test_expand_folds_empty_is_config_error() {
        let result = expand_folds(Path::new("/run"), &[]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("fold"));
    }

    #[test]
    fn test_expand_folds_single_entry() {
        let branches = expand_folds(Path::new("/run"), &[1]).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].fold, 1);
        assert_eq!(
            branches[0].image_embed_dir,
            PathBuf::from("/run/2.image_embedding_fold1")
        );
        assert_eq!(
            branches[0].coembed_dir,
            PathBuf::from("/run/3.coembedding_fold1")
        );
    }

    #[test]
    fn test_expand_folds_preserves_order() {
        let branches = expand_folds(Path::new("/run"), &[2, 1]).unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].fold, 2);
        assert_eq!(branches[1].fold, 1);
        assert_eq!(
            branches[1].image_embed_dir,
            PathBuf::from("/run/2.image_embedding_fold1")
        );
    }

    #[test]
    fn test_fs_probe_checks_directory_existence() {
        let temp = tempfile::tempdir().unwrap();
        let existing = StepSpec::new("image download", temp.path().join(IMAGE_DOWNLOAD_DIR));
        let probe = FsDirectoryProbe;

        assert!(!probe.is_complete(&existing));
        std::fs::create_dir_all(&existing.output_dir).unwrap();
        assert!(probe.is_complete(&existing));
    }

    #[test]
    fn test_fs_probe_file_is_not_complete() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(HIERARCHY_DIR);
        std::fs::write(&path, "not a directory").unwrap();
        let step = StepSpec::new("hierarchy", &path);

        assert!(!FsDirectoryProbe.is_complete(&step));
    }
}
