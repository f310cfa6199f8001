use std::process::ExitCode;

use burn::backend::{NdArray, ndarray::NdArrayDevice};
use rust_augment::{
    config::{AugmentCmd, RunConfig, USAGE},
    logging::setup_logging,
    run::run,
};
use tracing::{error, info};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let Some(config_path) = AugmentCmd::parse(&args).and_then(|cmd| cmd.config_path()) else {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    };

    let config = match RunConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n");
            eprint!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = setup_logging(config.verbose) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let device = NdArrayDevice::default();
    match run::<NdArray<f32>>(&config, &device) {
        Ok(summary) => {
            info!(
                "Done: {} samples loaded, {} files saved, {} failed",
                summary.loaded, summary.saved, summary.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
