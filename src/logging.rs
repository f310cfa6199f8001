use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{AugmentError, Result};

/// Installs the global subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| AugmentError::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}
