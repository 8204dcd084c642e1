//! precomputed-volume - converts a directory of slices into a precomputed volume.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use precomputed_volume::{Config, convert_directory};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Input: {}", config.input_path.display());
    info!("Output: {}", config.precomputed_path);

    match convert_directory(&config) {
        Ok(summary) => {
            info!(
                "Done: {} slice(s) at {} level(s) in {:.1}s",
                summary.slices_written, summary.num_levels, summary.elapsed_secs
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            if let Some(batch) = e.resume_batch() {
                error!("Earlier batches are committed; rerun with --start-batch {}", batch);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "precomputed_volume=debug"
    } else {
        "precomputed_volume=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
