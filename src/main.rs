//! cellmaps-pipeline CLI entry point.
//!
//! Initializes logging and delegates to the CLI module, exiting with the
//! pipeline's terminal status (2 when the run aborts with an error).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let cli = cellmaps_pipeline::cli::parse_cli();

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    let code = match cellmaps_pipeline::cli::run_with_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            2
        }
    };
    std::process::exit(code);
}
