//! Stage command construction.
//!
//! Every pipeline stage is an external tool invoked through its command-line
//! entry point. This module builds those invocations once, in one place, so
//! the serial executor (which spawns them) and the SLURM backend (which
//! writes them into job scripts) agree on the exact arguments. Missing input
//! combinations surface here as configuration errors, before any process is
//! spawned or script written.

use std::fmt;
use std::path::Path;

use super::config::{ConfigError, PipelineConfig};
use super::step::{
    FoldBranch, HIERARCHYEVAL_DIR, HIERARCHY_DIR, IMAGE_DOWNLOAD_DIR, PPI_DOWNLOAD_DIR,
    PPI_EMBEDDING_DIR,
};

/// Image download tool entry point.
pub const IMAGE_DOWNLOAD_CMD: &str = "cellmaps_imagedownloadercmd.py";
/// PPI download tool entry point.
pub const PPI_DOWNLOAD_CMD: &str = "cellmaps_ppidownloadercmd.py";
/// PPI embedding tool entry point.
pub const PPI_EMBEDDING_CMD: &str = "cellmaps_ppi_embeddingcmd.py";
/// Image embedding tool entry point.
pub const IMAGE_EMBEDDING_CMD: &str = "cellmaps_image_embeddingcmd.py";
/// Coembedding tool entry point.
pub const COEMBEDDING_CMD: &str = "cellmaps_coembeddingcmd.py";
/// Hierarchy generation tool entry point.
pub const HIERARCHY_CMD: &str = "cellmaps_generate_hierarchycmd.py";
/// Hierarchy evaluation tool entry point.
pub const HIERARCHYEVAL_CMD: &str = "cellmaps_hierarchyevalcmd.py";

/// One fully-built external command invocation for a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    /// Program to invoke.
    pub program: String,
    /// Arguments in invocation order, output directory first.
    pub args: Vec<String>,
}

impl StageCommand {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    fn flag_if(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    /// Tools log at maximum verbosity so the per-job output files are
    /// useful for post-mortems.
    fn verbose(self) -> Self {
        self.arg("-vvvv")
    }
}

impl fmt::Display for StageCommand {
    /// Renders the invocation as a single shell line for job scripts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn provenance(config: &PipelineConfig) -> Result<&Path, ConfigError> {
    config
        .provenance
        .as_deref()
        .ok_or_else(|| ConfigError::Missing("provenance".to_string()))
}

/// Builds the image download invocation.
///
/// # Errors
///
/// Returns `ConfigError` if neither a CM4AI image table nor a samples file
/// was supplied.
pub fn image_download(config: &PipelineConfig) -> Result<StageCommand, ConfigError> {
    let mut cmd = StageCommand::new(IMAGE_DOWNLOAD_CMD)
        .path_arg(&config.outdir.join(IMAGE_DOWNLOAD_DIR))
        .arg("--provenance")
        .path_arg(provenance(config)?);

    if let Some(table) = &config.cm4ai_image {
        cmd = cmd.arg("--cm4ai_table").path_arg(table);
    } else if let Some(samples) = &config.samples {
        cmd = cmd.arg("--samples").path_arg(samples);
        if let Some(unique) = &config.unique {
            cmd = cmd.arg("--unique").path_arg(unique);
        }
    } else {
        return Err(ConfigError::Missing(
            "cm4ai_image or samples must be set to download images".to_string(),
        ));
    }

    Ok(cmd
        .arg("--proteinatlasxml")
        .arg(config.proteinatlasxml.clone())
        .verbose())
}

/// Builds the PPI download invocation.
///
/// # Errors
///
/// Returns `ConfigError` if neither a CM4AI AP-MS table nor both the
/// edgelist and baitlist were supplied.
pub fn ppi_download(config: &PipelineConfig) -> Result<StageCommand, ConfigError> {
    let mut cmd = StageCommand::new(PPI_DOWNLOAD_CMD)
        .path_arg(&config.outdir.join(PPI_DOWNLOAD_DIR))
        .arg("--provenance")
        .path_arg(provenance(config)?);

    if let Some(table) = &config.cm4ai_apms {
        cmd = cmd.arg("--cm4ai_table").path_arg(table);
    } else if let (Some(edgelist), Some(baitlist)) = (&config.edgelist, &config.baitlist) {
        cmd = cmd
            .arg("--edgelist")
            .path_arg(edgelist)
            .arg("--baitlist")
            .path_arg(baitlist);
    } else {
        return Err(ConfigError::Missing(
            "cm4ai_apms or edgelist and baitlist must be set to download the PPI network"
                .to_string(),
        ));
    }

    Ok(cmd.verbose())
}

/// Builds the PPI embedding invocation, reading the PPI download output.
pub fn ppi_embedding(config: &PipelineConfig) -> StageCommand {
    StageCommand::new(PPI_EMBEDDING_CMD)
        .path_arg(&config.outdir.join(PPI_EMBEDDING_DIR))
        .arg("--inputdir")
        .path_arg(&config.outdir.join(PPI_DOWNLOAD_DIR))
        .flag_if("--fake_embedder", config.fake)
        .verbose()
}

/// Builds one fold's image embedding invocation, reading the image download
/// output.
pub fn image_embedding(config: &PipelineConfig, branch: &FoldBranch) -> StageCommand {
    StageCommand::new(IMAGE_EMBEDDING_CMD)
        .path_arg(&branch.image_embed_dir)
        .arg("--inputdir")
        .path_arg(&config.outdir.join(IMAGE_DOWNLOAD_DIR))
        .arg("--fold")
        .arg(branch.fold.to_string())
        .arg("--model_path")
        .arg(config.model_path.clone())
        .flag_if("--fake_embedder", config.fake)
        .verbose()
}

/// Builds one fold's coembedding invocation, reading that fold's image
/// embedding and the shared PPI embedding.
pub fn coembedding(config: &PipelineConfig, branch: &FoldBranch) -> StageCommand {
    StageCommand::new(COEMBEDDING_CMD)
        .path_arg(&branch.coembed_dir)
        .arg("--ppi_embeddingdir")
        .path_arg(&config.outdir.join(PPI_EMBEDDING_DIR))
        .arg("--image_embeddingdir")
        .path_arg(&branch.image_embed_dir)
        .flag_if("--fake_embedding", config.fake)
        .verbose()
}

/// Builds the hierarchy invocation, fanning in over every fold's
/// coembedding directory.
pub fn hierarchy(config: &PipelineConfig, branches: &[FoldBranch]) -> StageCommand {
    let mut cmd = StageCommand::new(HIERARCHY_CMD)
        .path_arg(&config.outdir.join(HIERARCHY_DIR))
        .arg("--coembedding_dirs");
    for branch in branches {
        cmd = cmd.path_arg(&branch.coembed_dir);
    }
    cmd = cmd.arg("--ppi_cutoffs");
    for cutoff in &config.ppi_cutoffs {
        cmd = cmd.arg(cutoff.to_string());
    }
    cmd.verbose()
}

/// Builds the hierarchy evaluation invocation.
pub fn hierarchy_eval(config: &PipelineConfig) -> StageCommand {
    StageCommand::new(HIERARCHYEVAL_CMD)
        .path_arg(&config.outdir.join(HIERARCHYEVAL_DIR))
        .arg("--hierarchy_dir")
        .path_arg(&config.outdir.join(HIERARCHY_DIR))
        .verbose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::step::expand_folds;
    use std::path::Path;

    fn test_config() -> PipelineConfig {
        PipelineConfig::new("/run")
            .with_samples("samples.csv")
            .with_unique("unique.csv")
            .with_edgelist("edgelist.tsv")
            .with_baitlist("baitlist.tsv")
            .with_provenance("provenance.json")
    }

    #[test]
    fn test_image_download_with_samples() {
        let cmd = image_download(&test_config()).unwrap();
        assert_eq!(cmd.program, IMAGE_DOWNLOAD_CMD);
        assert_eq!(cmd.args[0], "/run/1.image_download");
        let line = cmd.to_string();
        assert!(line.contains("--provenance provenance.json"));
        assert!(line.contains("--samples samples.csv"));
        assert!(line.contains("--unique unique.csv"));
        assert!(line.ends_with("-vvvv"));
    }

    #[test]
    fn test_image_download_cm4ai_table_takes_precedence() {
        let config = test_config().with_cm4ai_image("image_table.tsv");
        let cmd = image_download(&config).unwrap();
        let line = cmd.to_string();
        assert!(line.contains("--cm4ai_table image_table.tsv"));
        assert!(!line.contains("--samples"));
    }

    #[test]
    fn test_image_download_missing_inputs() {
        let config = PipelineConfig::new("/run").with_provenance("provenance.json");
        let result = image_download(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cm4ai_image"));
    }

    #[test]
    fn test_ppi_download_missing_inputs() {
        // A baitlist alone is not enough, the edgelist is required too.
        let config = PipelineConfig::new("/run")
            .with_provenance("provenance.json")
            .with_baitlist("baitlist.tsv");
        let result = ppi_download(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("edgelist"));
    }

    #[test]
    fn test_ppi_download_with_edge_and_bait_lists() {
        let cmd = ppi_download(&test_config()).unwrap();
        let line = cmd.to_string();
        assert!(line.starts_with(PPI_DOWNLOAD_CMD));
        assert!(line.contains("--edgelist edgelist.tsv"));
        assert!(line.contains("--baitlist baitlist.tsv"));
    }

    #[test]
    fn test_ppi_embedding_reads_ppi_download() {
        let cmd = ppi_embedding(&test_config());
        let line = cmd.to_string();
        assert_eq!(cmd.args[0], "/run/1.ppi_embedding");
        assert!(line.contains("--inputdir /run/1.ppi_download"));
        assert!(!line.contains("--fake_embedder"));
    }

    #[test]
    fn test_fake_flags() {
        let config = test_config().with_fake(true);
        let branches = expand_folds(Path::new("/run"), &[1]).unwrap();

        assert!(ppi_embedding(&config)
            .to_string()
            .contains("--fake_embedder"));
        assert!(image_embedding(&config, &branches[0])
            .to_string()
            .contains("--fake_embedder"));
        assert!(coembedding(&config, &branches[0])
            .to_string()
            .contains("--fake_embedding"));
    }

    #[test]
    fn test_image_embedding_fold_arguments() {
        let config = test_config();
        let branches = expand_folds(Path::new("/run"), &[2]).unwrap();
        let line = image_embedding(&config, &branches[0]).to_string();
        assert!(line.contains("/run/2.image_embedding_fold2"));
        assert!(line.contains("--fold 2"));
        assert!(line.contains("--model_path"));
    }

    #[test]
    fn test_coembedding_reads_both_embeddings() {
        let config = test_config();
        let branches = expand_folds(Path::new("/run"), &[1]).unwrap();
        let line = coembedding(&config, &branches[0]).to_string();
        assert!(line.contains("--ppi_embeddingdir /run/1.ppi_embedding"));
        assert!(line.contains("--image_embeddingdir /run/2.image_embedding_fold1"));
    }

    #[test]
    fn test_hierarchy_fans_in_over_all_folds() {
        let config = test_config();
        let branches = expand_folds(Path::new("/run"), &[1, 2]).unwrap();
        let line = hierarchy(&config, &branches).to_string();
        assert!(line
            .contains("--coembedding_dirs /run/3.coembedding_fold1 /run/3.coembedding_fold2"));
        assert!(line.contains("--ppi_cutoffs 0.001"));
    }

    #[test]
    fn test_hierarchy_eval_reads_hierarchy() {
        let line = hierarchy_eval(&test_config()).to_string();
        assert!(line.contains("/run/4.hierarchyeval"));
        assert!(line.contains("--hierarchy_dir /run/4.hierarchy"));
    }
}
