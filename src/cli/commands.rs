//! CLI definition and dispatch.
//!
//! The flag surface mirrors the command-line tools this pipeline drives:
//! underscored long options, one positional output directory, and a
//! `--slurm` switch that selects the script-generating backend over the
//! in-process one.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::error::PipelineError;
use crate::pipeline::config::{
    ConfigError, PipelineConfig, SlurmDirectives, DEFAULT_MODEL_PATH, DEFAULT_PPI_CUTOFFS,
    DEFAULT_PROTEINATLAS_XML,
};
use crate::pipeline::{Executor, PipelineRun, SerialExecutor, SlurmScriptExecutor};

/// Cell maps pipeline orchestrator.
#[derive(Parser, Debug, Serialize)]
#[command(name = "cellmaps-pipeline")]
#[command(about = "Run the cell maps pipeline: download, embed, co-embed, build and evaluate a hierarchy")]
#[command(version)]
#[command(long_about = "\
Takes ImmunoFluorescent images and Affinity Purification Mass Spectrometry
data, converts them into embeddings that are co-embedded and turned into an
integrated interaction network from which a hierarchical model is derived.

        ppi_download   image_download
              |              |
        ppi_embedding  image_embedding_fold#
                \\           /
              co_embedding_fold#
                      |
                  hierarchy
                      |
                 hierarchyeval

Steps whose output directory already exists under <OUTDIR> are skipped, so a
partially completed run can be resumed by invoking the same command again.
With --slurm no step is executed; SLURM job scripts plus a driver script are
written into <OUTDIR> instead.")]
pub struct Cli {
    /// Output directory.
    pub outdir: PathBuf,

    /// Path to a CM4AI AP-MS table file.
    #[arg(long = "cm4ai_apms")]
    pub cm4ai_apms: Option<PathBuf>,

    /// Path to a CM4AI IF image table file.
    #[arg(long = "cm4ai_image")]
    pub cm4ai_image: Option<PathBuf>,

    /// CSV file with the list of IF images to download.
    #[arg(long)]
    pub samples: Option<PathBuf>,

    /// CSV file of unique samples.
    #[arg(long)]
    pub unique: Option<PathBuf>,

    /// Edgelist TSV file for the PPI download step.
    #[arg(long)]
    pub edgelist: Option<PathBuf>,

    /// Baitlist TSV file for the PPI download step.
    #[arg(long)]
    pub baitlist: Option<PathBuf>,

    /// URL or path to the model file for image embedding.
    #[arg(long = "model_path", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: String,

    /// URL or path to proteinatlas.xml or proteinatlas.xml.gz.
    #[arg(long, default_value = DEFAULT_PROTEINATLAS_XML)]
    pub proteinatlasxml: String,

    /// Cutoffs used to generate PPI input networks, one network per cutoff.
    #[arg(long = "ppi_cutoffs", num_args = 1.., default_values_t = DEFAULT_PPI_CUTOFFS)]
    pub ppi_cutoffs: Vec<f64>,

    /// Image embedding fold(s) to use. Each additional fold creates another
    /// 2.image_embedding_fold# and 3.coembedding_fold# directory that feeds
    /// into the hierarchy step.
    #[arg(long = "fold", num_args = 1.., default_values_t = [1, 2])]
    pub fold: Vec<u32>,

    /// Path to a JSON file with provenance information about the input
    /// files.
    #[arg(long, required = true)]
    pub provenance: PathBuf,

    /// Generate fake data for every step.
    #[arg(long)]
    pub fake: bool,

    /// Write SLURM job scripts and a driver script into <OUTDIR> instead of
    /// running the pipeline; invoke the driver on a SLURM submit node.
    #[arg(long)]
    pub slurm: bool,

    /// SLURM partition to submit jobs to.
    #[arg(long = "slurm_partition")]
    pub slurm_partition: Option<String>,

    /// SLURM account to charge jobs to.
    #[arg(long = "slurm_account")]
    pub slurm_account: Option<String>,

    /// CPUs requested per SLURM job.
    #[arg(long = "slurm_cpus", default_value_t = 4)]
    pub slurm_cpus: u32,

    /// Memory requested per SLURM job.
    #[arg(long = "slurm_mem", default_value = "32G")]
    pub slurm_mem: String,

    /// Wall-clock limit per SLURM job.
    #[arg(long = "slurm_time", default_value = "24:00:00")]
    pub slurm_time: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Maps the parsed arguments onto a run configuration.
    pub fn to_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.outdir)
            .with_model_path(self.model_path.clone())
            .with_proteinatlasxml(self.proteinatlasxml.clone())
            .with_ppi_cutoffs(self.ppi_cutoffs.clone())
            .with_folds(self.fold.clone())
            .with_provenance(&self.provenance)
            .with_fake(self.fake)
            .with_slurm_directives(SlurmDirectives {
                partition: self.slurm_partition.clone(),
                account: self.slurm_account.clone(),
                cpus_per_task: self.slurm_cpus,
                memory: self.slurm_mem.clone(),
                walltime: self.slurm_time.clone(),
            });

        if let Some(path) = &self.cm4ai_apms {
            config = config.with_cm4ai_apms(path);
        }
        if let Some(path) = &self.cm4ai_image {
            config = config.with_cm4ai_image(path);
        }
        if let Some(path) = &self.samples {
            config = config.with_samples(path);
        }
        if let Some(path) = &self.unique {
            config = config.with_unique(path);
        }
        if let Some(path) = &self.edgelist {
            config = config.with_edgelist(path);
        }
        if let Some(path) = &self.baitlist {
            config = config.with_baitlist(path);
        }
        config
    }

    /// Rejects dangling CM4AI table paths before the run starts.
    fn validate_input_paths(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            ("cm4ai_image", &self.cm4ai_image),
            ("cm4ai_apms", &self.cm4ai_apms),
        ] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(ConfigError::Invalid {
                        field: field.to_string(),
                        message: format!("file under path {} does not exist", path.display()),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Parses the command line.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Builds the configured pipeline and runs it, returning its terminal exit
/// status.
///
/// # Errors
///
/// Returns an error for invalid configuration, a failed step, or
/// filesystem problems under the output root.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    cli.validate_input_paths().map_err(PipelineError::from)?;

    let config = cli.to_config();
    config.validate().map_err(PipelineError::from)?;

    let command_line = serde_json::to_value(&cli)?;

    let executor: Box<dyn Executor> = if cli.slurm {
        info!("Using SLURM script backend");
        Box::new(SlurmScriptExecutor::new(config.clone()))
    } else {
        info!("Using in-process serial executor");
        Box::new(SerialExecutor::from_config(&config).map_err(PipelineError::from)?)
    };

    let mut run = PipelineRun::new(config.outdir, executor, command_line);
    Ok(run.run()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(
            std::iter::once("cellmaps-pipeline").chain(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["/tmp/run", "--provenance", "p.json"]);
        assert_eq!(cli.fold, vec![1, 2]);
        assert_eq!(cli.ppi_cutoffs.len(), 15);
        assert_eq!(cli.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(cli.proteinatlasxml, DEFAULT_PROTEINATLAS_XML);
        assert!(!cli.fake);
        assert!(!cli.slurm);
        assert_eq!(cli.slurm_cpus, 4);
        assert_eq!(cli.slurm_mem, "32G");
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_provenance_is_required() {
        let result = Cli::try_parse_from(["cellmaps-pipeline", "/tmp/run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fold_list_parsing() {
        let cli = parse(&["/tmp/run", "--provenance", "p.json", "--fold", "1", "2"]);
        assert_eq!(cli.fold, vec![1, 2]);

        let cli = parse(&["/tmp/run", "--provenance", "p.json", "--fold", "2"]);
        assert_eq!(cli.fold, vec![2]);
    }

    #[test]
    fn test_to_config_maps_inputs_and_slurm_directives() {
        let cli = parse(&[
            "/tmp/run",
            "--provenance",
            "p.json",
            "--samples",
            "samples.csv",
            "--edgelist",
            "edges.tsv",
            "--baitlist",
            "baits.tsv",
            "--fake",
            "--slurm",
            "--slurm_partition",
            "nrnb-compute",
            "--slurm_cpus",
            "8",
        ]);
        let config = cli.to_config();

        assert_eq!(config.outdir, PathBuf::from("/tmp/run"));
        assert_eq!(config.samples, Some(PathBuf::from("samples.csv")));
        assert_eq!(config.edgelist, Some(PathBuf::from("edges.tsv")));
        assert!(config.fake);
        assert_eq!(config.slurm.partition.as_deref(), Some("nrnb-compute"));
        assert_eq!(config.slurm.cpus_per_task, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dangling_cm4ai_path_is_rejected() {
        let cli = parse(&[
            "/tmp/run",
            "--provenance",
            "p.json",
            "--cm4ai_image",
            "/no/such/table.tsv",
        ]);
        let result = cli.validate_input_paths();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cm4ai_image"));
    }

    #[test]
    fn test_cli_serializes_for_run_record() {
        let cli = parse(&["/tmp/run", "--provenance", "p.json", "--fake"]);
        let value = serde_json::to_value(&cli).unwrap();
        assert_eq!(value["outdir"], "/tmp/run");
        assert_eq!(value["fake"], true);
        assert_eq!(value["fold"][1], 2);
    }
}
