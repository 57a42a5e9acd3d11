use tracing_subscriber::{EnvFilter, fmt};

use crate::app::AppError;

const DEFAULT_FILTER: &str = "info,reqwest=warn";

/// Diagnostics go to stdout next to the report; `RUST_LOG` overrides the filter.
pub fn init() -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .try_init()
        .map_err(AppError::logging_init)
}
