//! In-process serial executor.
//!
//! Walks the pipeline DAG in topological order, one blocking collaborator at
//! a time, skipping every step whose output directory already exists and
//! aborting on the first non-zero exit status. Re-running against a
//! partially complete output root re-skips exactly the completed steps, so a
//! second run after success is a no-op.

use std::path::Path;

use tracing::{debug, info};

use crate::collaborators::{Collaborator, CommandCollaborator, FakeCollaborator};
use crate::error::PipelineError;

use super::command;
use super::config::{ConfigError, PipelineConfig};
use super::step::{
    expand_folds, DirectoryProbe, FsDirectoryProbe, StepSpec, HIERARCHYEVAL_DIR, HIERARCHY_DIR,
    IMAGE_DOWNLOAD_DIR, PPI_DOWNLOAD_DIR, PPI_EMBEDDING_DIR,
};
use super::Executor;

/// Where the serial executor is in its strictly linear walk.
///
/// The embedding and coembedding phases internally loop once per fold
/// branch; everything else is a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    DownloadingInputs,
    Embedding,
    Coembedding,
    BuildingHierarchy,
    Evaluating,
    Done,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "not_started"),
            Phase::DownloadingInputs => write!(f, "downloading_inputs"),
            Phase::Embedding => write!(f, "embedding"),
            Phase::Coembedding => write!(f, "coembedding"),
            Phase::BuildingHierarchy => write!(f, "building_hierarchy"),
            Phase::Evaluating => write!(f, "evaluating"),
            Phase::Done => write!(f, "done"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// One step paired with the collaborator that produces its output.
pub struct Stage {
    /// Static description of the step.
    pub spec: StepSpec,
    /// External unit of work invoked when the step is not already complete.
    pub collaborator: Box<dyn Collaborator>,
}

impl Stage {
    /// Couples a step spec with its collaborator.
    pub fn new(spec: StepSpec, collaborator: Box<dyn Collaborator>) -> Self {
        Self { spec, collaborator }
    }
}

/// The full stage set of one run, in dependency order.
pub struct SerialStages {
    pub image_download: Stage,
    pub ppi_download: Stage,
    pub ppi_embedding: Stage,
    /// One image embedding stage per fold, in fold-list order.
    pub image_embeddings: Vec<Stage>,
    /// One coembedding stage per fold, in fold-list order.
    pub coembeddings: Vec<Stage>,
    pub hierarchy: Stage,
    pub hierarchy_eval: Stage,
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor").finish_non_exhaustive()
    }
}

/// Single-threaded executor that runs every stage in-process.
pub struct SerialExecutor {
    stages: SerialStages,
    probe: Box<dyn DirectoryProbe>,
    phase: Phase,
}

impl SerialExecutor {
    /// Creates an executor over an explicit stage set and probe.
    pub fn new(stages: SerialStages, probe: Box<dyn DirectoryProbe>) -> Self {
        Self {
            stages,
            probe,
            phase: Phase::NotStarted,
        }
    }

    /// Builds the executor from a run configuration.
    ///
    /// With `fake` set, every stage is a [`FakeCollaborator`]; otherwise
    /// each stage invokes its external command-line tool. Command
    /// construction validates per-stage input combinations, so missing
    /// inputs surface here, before anything runs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the fold list is empty or a download stage
    /// is missing its input files.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let branches = expand_folds(&config.outdir, &config.folds)?;
        let outdir = &config.outdir;

        let image_download = Stage::new(
            StepSpec::new("image download", outdir.join(IMAGE_DOWNLOAD_DIR)),
            make_collaborator(config, "image download", &outdir.join(IMAGE_DOWNLOAD_DIR), || {
                command::image_download(config)
            })?,
        );
        let ppi_download = Stage::new(
            StepSpec::new("ppi download", outdir.join(PPI_DOWNLOAD_DIR)),
            make_collaborator(config, "ppi download", &outdir.join(PPI_DOWNLOAD_DIR), || {
                command::ppi_download(config)
            })?,
        );
        let ppi_embedding = Stage::new(
            StepSpec::new("ppi embedding", outdir.join(PPI_EMBEDDING_DIR))
                .with_input(outdir.join(PPI_DOWNLOAD_DIR)),
            make_collaborator(config, "ppi embedding", &outdir.join(PPI_EMBEDDING_DIR), || {
                Ok(command::ppi_embedding(config))
            })?,
        );

        let mut image_embeddings = Vec::with_capacity(branches.len());
        let mut coembeddings = Vec::with_capacity(branches.len());
        for branch in &branches {
            let name = format!("image embedding fold{}", branch.fold);
            image_embeddings.push(Stage::new(
                StepSpec::new(name.clone(), &branch.image_embed_dir)
                    .with_input(outdir.join(IMAGE_DOWNLOAD_DIR)),
                make_collaborator(config, &name, &branch.image_embed_dir, || {
                    Ok(command::image_embedding(config, branch))
                })?,
            ));

            let name = format!("coembedding fold{}", branch.fold);
            coembeddings.push(Stage::new(
                StepSpec::new(name.clone(), &branch.coembed_dir)
                    .with_input(&branch.image_embed_dir)
                    .with_input(outdir.join(PPI_EMBEDDING_DIR)),
                make_collaborator(config, &name, &branch.coembed_dir, || {
                    Ok(command::coembedding(config, branch))
                })?,
            ));
        }

        let mut hierarchy_spec = StepSpec::new("hierarchy", outdir.join(HIERARCHY_DIR))
            .with_input(outdir.join(PPI_EMBEDDING_DIR));
        for branch in &branches {
            hierarchy_spec = hierarchy_spec.with_input(&branch.coembed_dir);
        }
        let hierarchy = Stage::new(
            hierarchy_spec,
            make_collaborator(config, "hierarchy", &outdir.join(HIERARCHY_DIR), || {
                Ok(command::hierarchy(config, &branches))
            })?,
        );
        let hierarchy_eval = Stage::new(
            StepSpec::new("hierarchy evaluation", outdir.join(HIERARCHYEVAL_DIR))
                .with_input(outdir.join(HIERARCHY_DIR)),
            make_collaborator(
                config,
                "hierarchy evaluation",
                &outdir.join(HIERARCHYEVAL_DIR),
                || Ok(command::hierarchy_eval(config)),
            )?,
        );

        Ok(Self::new(
            SerialStages {
                image_download,
                ppi_download,
                ppi_embedding,
                image_embeddings,
                coembeddings,
                hierarchy,
                hierarchy_eval,
            },
            Box::new(FsDirectoryProbe),
        ))
    }

    /// The executor's current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn run_inner(&mut self) -> Result<(), PipelineError> {
        self.phase = Phase::DownloadingInputs;
        // Image download precedes ppi download. Nothing orders the two
        // roots; the order is fixed so reruns and logs are deterministic.
        run_stage(self.probe.as_ref(), &self.stages.image_download)?;
        run_stage(self.probe.as_ref(), &self.stages.ppi_download)?;

        self.phase = Phase::Embedding;
        run_stage(self.probe.as_ref(), &self.stages.ppi_embedding)?;
        for stage in &self.stages.image_embeddings {
            run_stage(self.probe.as_ref(), stage)?;
        }

        self.phase = Phase::Coembedding;
        for stage in &self.stages.coembeddings {
            run_stage(self.probe.as_ref(), stage)?;
        }

        self.phase = Phase::BuildingHierarchy;
        run_stage(self.probe.as_ref(), &self.stages.hierarchy)?;

        self.phase = Phase::Evaluating;
        run_stage(self.probe.as_ref(), &self.stages.hierarchy_eval)?;

        Ok(())
    }
}

impl Executor for SerialExecutor {
    /// Runs every stage in order, returning 0 only if every stage
    /// (including every fold branch) returned 0.
    fn run(&mut self) -> Result<i32, PipelineError> {
        match self.run_inner() {
            Ok(()) => {
                self.phase = Phase::Done;
                Ok(0)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }
}

fn make_collaborator(
    config: &PipelineConfig,
    name: &str,
    output_dir: &Path,
    build: impl FnOnce() -> Result<command::StageCommand, ConfigError>,
) -> Result<Box<dyn Collaborator>, ConfigError> {
    if config.fake {
        Ok(Box::new(FakeCollaborator::new(name, output_dir)))
    } else {
        Ok(Box::new(CommandCollaborator::new(build()?)))
    }
}

fn run_stage(probe: &dyn DirectoryProbe, stage: &Stage) -> Result<(), PipelineError> {
    if stage.spec.skip_if_exists && probe.is_complete(&stage.spec) {
        info!(
            step = %stage.spec.name,
            outdir = %stage.spec.output_dir.display(),
            "Output directory exists, skipping step"
        );
        return Ok(());
    }

    debug!(step = %stage.spec.name, "Running step");
    let status = stage.collaborator.run()?;
    if status != 0 {
        return Err(PipelineError::StepFailed {
            step: stage.spec.name.clone(),
            status,
        });
    }
    Ok(())
}
