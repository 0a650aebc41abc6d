//! SLURM batch backend.
//!
//! Pure code generator: instead of running steps it emits one `sbatch`-ready
//! script per step plus a driver script that submits them all, wiring the
//! DAG edges as `--dependency=afterok:` expressions. All real concurrency
//! and failure handling happens inside the external scheduler; once the
//! scripts are written this crate is out of the picture.
//!
//! Each step script carries its own skip-guard, so resumability holds at the
//! script level too: a job whose output directory already exists exits 0
//! without doing work.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::error::PipelineError;

use super::command::{self, StageCommand};
use super::config::{ConfigError, PipelineConfig};
use super::step::{expand_folds, HIERARCHYEVAL_DIR, HIERARCHY_DIR, IMAGE_DOWNLOAD_DIR,
    PPI_DOWNLOAD_DIR, PPI_EMBEDDING_DIR};
use super::Executor;

/// Name of the generated driver script in the output root.
pub const DRIVER_SCRIPT: &str = "slurm_cellmaps_job.sh";

/// One generated job script. Write-once: never mutated after being written
/// to disk. `depends_on` mirrors the step's input edges, expanded across all
/// fold branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScript {
    /// Script file name inside the output root.
    pub filename: String,
    /// Shell variable the driver captures this job's id into.
    pub job_var: String,
    /// Human-readable name used in the driver's echo lines.
    pub display_name: String,
    /// Full script body.
    pub body: String,
    /// `job_var`s of the upstream jobs this one waits for.
    pub depends_on: Vec<String>,
}

/// Executor that writes SLURM job scripts instead of running steps.
pub struct SlurmScriptExecutor {
    config: PipelineConfig,
}

impl SlurmScriptExecutor {
    /// Creates a script generator for the given run configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Builds every job script in submission order without touching the
    /// filesystem.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the fold list is empty or a download stage
    /// is missing its input files. Generation fails fast: no script is
    /// written when any stage is misconfigured.
    pub fn generate(&self) -> Result<Vec<JobScript>, ConfigError> {
        let config = &self.config;
        let branches = expand_folds(&config.outdir, &config.folds)?;
        let outdir = &config.outdir;

        let mut jobs = vec![
            self.job_script(
                "imagedownloadjob.sh",
                "image_download_job",
                "image download",
                &outdir.join(IMAGE_DOWNLOAD_DIR),
                command::image_download(config)?,
                Vec::new(),
            ),
            self.job_script(
                "ppidownloadjob.sh",
                "ppi_download_job",
                "ppi download",
                &outdir.join(PPI_DOWNLOAD_DIR),
                command::ppi_download(config)?,
                Vec::new(),
            ),
            self.job_script(
                "ppiembedjob.sh",
                "ppi_embed_job",
                "ppi embedding",
                &outdir.join(PPI_EMBEDDING_DIR),
                command::ppi_embedding(config),
                vec!["ppi_download_job".to_string()],
            ),
        ];

        for branch in &branches {
            jobs.push(self.job_script(
                &format!("imageembedjob_fold{}.sh", branch.fold),
                &format!("image_embed_job{}", branch.fold),
                &format!("image embedding fold{}", branch.fold),
                &branch.image_embed_dir,
                command::image_embedding(config, branch),
                vec!["image_download_job".to_string()],
            ));
        }

        for branch in &branches {
            jobs.push(self.job_script(
                &format!("coembedjob_fold{}.sh", branch.fold),
                &format!("coembed_job{}", branch.fold),
                &format!("coembedding fold{}", branch.fold),
                &branch.coembed_dir,
                command::coembedding(config, branch),
                vec![
                    format!("image_embed_job{}", branch.fold),
                    "ppi_embed_job".to_string(),
                ],
            ));
        }

        // Fan-in: hierarchy waits for the shared ppi embedding and every
        // fold's coembedding.
        let mut hierarchy_deps = vec!["ppi_embed_job".to_string()];
        hierarchy_deps.extend(branches.iter().map(|b| format!("coembed_job{}", b.fold)));
        jobs.push(self.job_script(
            "hierarchyjob.sh",
            "hierarchy_job",
            "hierarchy",
            &outdir.join(HIERARCHY_DIR),
            command::hierarchy(config, &branches),
            hierarchy_deps,
        ));

        jobs.push(self.job_script(
            "hierarchyevaljob.sh",
            "hierarchyeval_job",
            "hierarchy evaluation",
            &outdir.join(HIERARCHYEVAL_DIR),
            command::hierarchy_eval(config),
            vec!["hierarchy_job".to_string()],
        ));

        Ok(jobs)
    }

    /// Renders the driver script that submits every job in order.
    pub fn driver_script(&self, jobs: &[JobScript]) -> String {
        let mut body = String::from("#!/bin/bash\n\n");
        body.push_str("# Submits the cell maps pipeline as a chain of SLURM jobs.\n");
        body.push_str("# Run this on a SLURM submit node.\n\n");

        for job in jobs {
            let script_path = self.config.outdir.join(&job.filename);
            let dependency = if job.depends_on.is_empty() {
                String::new()
            } else {
                let ids: Vec<String> = job.depends_on.iter().map(|v| format!("${v}")).collect();
                format!("--dependency=afterok:{} ", ids.join(":"))
            };
            let _ = writeln!(
                body,
                "{}=$(sbatch {}{} | awk '{{print $4}}')",
                job.job_var,
                dependency,
                script_path.display()
            );
            let _ = writeln!(
                body,
                "echo \"Submitted {} job: ${}\"",
                job.display_name, job.job_var
            );
            body.push('\n');
        }

        body
    }

    fn job_script(
        &self,
        filename: &str,
        job_var: &str,
        display_name: &str,
        step_dir: &Path,
        command: StageCommand,
        depends_on: Vec<String>,
    ) -> JobScript {
        let slurm = &self.config.slurm;
        let mut body = String::from("#!/bin/bash\n");
        let _ = writeln!(body, "#SBATCH --job-name=cellmaps_{job_var}");
        let _ = writeln!(body, "#SBATCH --chdir={}", self.config.outdir.display());
        let _ = writeln!(
            body,
            "#SBATCH --output={}",
            self.config.outdir.join(format!("{job_var}.%j.out")).display()
        );
        if let Some(partition) = &slurm.partition {
            let _ = writeln!(body, "#SBATCH --partition={partition}");
        }
        if let Some(account) = &slurm.account {
            let _ = writeln!(body, "#SBATCH --account={account}");
        }
        let _ = writeln!(body, "#SBATCH --cpus-per-task={}", slurm.cpus_per_task);
        let _ = writeln!(body, "#SBATCH --mem={}", slurm.memory);
        let _ = writeln!(body, "#SBATCH --time={}", slurm.walltime);

        // Same resumability rule as the serial executor, enforced by the
        // script itself so a requeued job set stays idempotent.
        let _ = write!(
            body,
            "\nif [ -d \"{dir}\" ] ; then\n  echo \"{dir} already exists. Skipping.\"\n  exit 0\nfi\n\n",
            dir = step_dir.display()
        );

        let _ = writeln!(body, "{command}");
        body.push_str("exit $?\n");

        JobScript {
            filename: filename.to_string(),
            job_var: job_var.to_string(),
            display_name: display_name.to_string(),
            body,
            depends_on,
        }
    }

    fn write_script(&self, path: &Path, body: &str) -> Result<(), PipelineError> {
        std::fs::write(path, body)?;
        make_executable(path)?;
        Ok(())
    }
}

impl Executor for SlurmScriptExecutor {
    /// Generates and writes every job script plus the driver, then returns.
    ///
    /// No job is submitted: the user invokes the driver script on a submit
    /// node. Returns 0 once all scripts are on disk.
    fn run(&mut self) -> Result<i32, PipelineError> {
        let jobs = self.generate()?;

        for job in &jobs {
            let path = self.config.outdir.join(&job.filename);
            self.write_script(&path, &job.body)?;
            info!(script = %path.display(), "Wrote job script");
        }

        let driver_path = self.config.outdir.join(DRIVER_SCRIPT);
        self.write_script(&driver_path, &self.driver_script(&jobs))?;
        info!(
            driver = %driver_path.display(),
            jobs = jobs.len(),
            "Wrote SLURM driver script; invoke it on a submit node to start the pipeline"
        );

        Ok(0)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
