//! Pipeline configuration.
//!
//! This module provides the configuration for one pipeline run: the output
//! root, the input tables the download stages consume, the fold list that
//! fans the embedding stages out, and the SLURM resource directives used by
//! the script-generating backend.

use std::path::PathBuf;
use thiserror::Error;

/// Default model file used by the image embedding stage.
pub const DEFAULT_MODEL_PATH: &str =
    "https://github.com/CellProfiling/densenet/releases/download/v0.1.0/external_crop512_focal_slov_hardlog_class_densenet121_dropout_i768_aug2_5folds_fold0_final.pth";

/// Default protein atlas XML used to locate images missing from HPA.
pub const DEFAULT_PROTEINATLAS_XML: &str =
    "https://www.proteinatlas.org/download/proteinatlas.xml.gz";

/// Default cutoffs used to generate PPI input networks from coembeddings.
pub const DEFAULT_PPI_CUTOFFS: [f64; 15] = [
    0.001, 0.002, 0.003, 0.004, 0.005, 0.006, 0.007, 0.008, 0.009, 0.01, 0.02, 0.03, 0.04, 0.05,
    0.10,
];

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required input is missing.
    #[error("Missing required input: {0}")]
    Missing(String),

    /// A field has an invalid value.
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// SLURM resource directives emitted into every generated job script.
///
/// All values are defaulted but overridable; they are passed through to
/// `#SBATCH` lines verbatim, the scheduler owns their interpretation.
#[derive(Debug, Clone)]
pub struct SlurmDirectives {
    /// Partition to submit jobs to, omitted from scripts when unset.
    pub partition: Option<String>,
    /// Account to charge jobs to, omitted from scripts when unset.
    pub account: Option<String>,
    /// CPUs requested per job.
    pub cpus_per_task: u32,
    /// Memory requested per job (e.g. `32G`).
    pub memory: String,
    /// Wall-clock limit per job (e.g. `24:00:00`).
    pub walltime: String,
}

impl Default for SlurmDirectives {
    fn default() -> Self {
        Self {
            partition: None,
            account: None,
            cpus_per_task: 4,
            memory: "32G".to_string(),
            walltime: "24:00:00".to_string(),
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Output root under which every step directory is created.
    pub outdir: PathBuf,

    // Download inputs
    /// CM4AI AP-MS table consumed by the PPI download stage.
    pub cm4ai_apms: Option<PathBuf>,
    /// CM4AI IF image table consumed by the image download stage.
    pub cm4ai_image: Option<PathBuf>,
    /// CSV of IF images to download.
    pub samples: Option<PathBuf>,
    /// CSV of unique samples.
    pub unique: Option<PathBuf>,
    /// Edgelist TSV consumed by the PPI download stage.
    pub edgelist: Option<PathBuf>,
    /// Baitlist TSV consumed by the PPI download stage.
    pub baitlist: Option<PathBuf>,

    // Stage parameters
    /// URL or path of the image embedding model file.
    pub model_path: String,
    /// URL or path of proteinatlas.xml used by the image download stage.
    pub proteinatlasxml: String,
    /// Cutoffs used to generate PPI input networks, one network per cutoff.
    pub ppi_cutoffs: Vec<f64>,
    /// Folds to run the image embedding and coembedding stages for.
    pub folds: Vec<u32>,

    /// Path to the provenance JSON describing the input files.
    pub provenance: Option<PathBuf>,
    /// Run every stage with a fake implementation that only creates
    /// its output directory.
    pub fake: bool,

    /// Resource directives for the SLURM backend.
    pub slurm: SlurmDirectives,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::new(),
            cm4ai_apms: None,
            cm4ai_image: None,
            samples: None,
            unique: None,
            edgelist: None,
            baitlist: None,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            proteinatlasxml: DEFAULT_PROTEINATLAS_XML.to_string(),
            ppi_cutoffs: DEFAULT_PPI_CUTOFFS.to_vec(),
            folds: vec![1, 2],
            provenance: None,
            fake: false,
            slurm: SlurmDirectives::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values for the given output root.
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration values.
    ///
    /// Per-stage input combinations (e.g. samples vs. CM4AI table) are
    /// checked where the stage commands are built, not here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the output root is unset, the fold list is
    /// empty, or no provenance file was supplied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outdir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "outdir is not set".to_string(),
            ));
        }

        if self.folds.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "fold cannot be empty".to_string(),
            ));
        }

        if self.provenance.is_none() {
            return Err(ConfigError::Missing("provenance".to_string()));
        }

        Ok(())
    }

    /// Builder method to set the CM4AI AP-MS table.
    pub fn with_cm4ai_apms(mut self, path: impl Into<PathBuf>) -> Self {
        self.cm4ai_apms = Some(path.into());
        self
    }

    /// Builder method to set the CM4AI IF image table.
    pub fn with_cm4ai_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.cm4ai_image = Some(path.into());
        self
    }

    /// Builder method to set the samples CSV.
    pub fn with_samples(mut self, path: impl Into<PathBuf>) -> Self {
        self.samples = Some(path.into());
        self
    }

    /// Builder method to set the unique samples CSV.
    pub fn with_unique(mut self, path: impl Into<PathBuf>) -> Self {
        self.unique = Some(path.into());
        self
    }

    /// Builder method to set the edgelist TSV.
    pub fn with_edgelist(mut self, path: impl Into<PathBuf>) -> Self {
        self.edgelist = Some(path.into());
        self
    }

    /// Builder method to set the baitlist TSV.
    pub fn with_baitlist(mut self, path: impl Into<PathBuf>) -> Self {
        self.baitlist = Some(path.into());
        self
    }

    /// Builder method to set the image embedding model path.
    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Builder method to set the proteinatlas.xml location.
    pub fn with_proteinatlasxml(mut self, path: impl Into<String>) -> Self {
        self.proteinatlasxml = path.into();
        self
    }

    /// Builder method to set the PPI cutoffs.
    pub fn with_ppi_cutoffs(mut self, cutoffs: Vec<f64>) -> Self {
        self.ppi_cutoffs = cutoffs;
        self
    }

    /// Builder method to set the fold list.
    pub fn with_folds(mut self, folds: Vec<u32>) -> Self {
        self.folds = folds;
        self
    }

    /// Builder method to set the provenance file.
    pub fn with_provenance(mut self, path: impl Into<PathBuf>) -> Self {
        self.provenance = Some(path.into());
        self
    }

    /// Builder method to enable or disable fake stages.
    pub fn with_fake(mut self, fake: bool) -> Self {
        self.fake = fake;
        self
    }

    /// Builder method to set the SLURM resource directives.
    pub fn with_slurm_directives(mut self, slurm: SlurmDirectives) -> Self {
        self.slurm = slurm;
        self
    }
}
