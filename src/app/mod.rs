mod config;
mod error;
mod logging;
mod runtime;

pub use config::{AppConfig, load_credentials};
pub use error::AppError;
pub use runtime::{collect_snapshot, detector_for};

/// Dispatches on the first argument: `fetch` or `diff`.
pub fn run() -> Result<(), AppError> {
    match std::env::args().nth(1).as_deref() {
        Some("fetch") => run_fetch(),
        Some("diff") => run_diff(),
        Some(other) => Err(AppError::config(format!(
            "unknown mode {other:?}, expected fetch or diff"
        ))),
        None => Err(AppError::config("usage: attest_history <fetch|diff>")),
    }
}

pub fn run_fetch() -> Result<(), AppError> {
    bootstrap()?;

    let config = AppConfig::from_env()?;
    let credentials = load_credentials()?;

    tracing::info!(
        base_url = %config.base_url,
        cookie_file = %config.cookie_file.display(),
        snapshot_file = %config.snapshot_file.display(),
        http_timeout_secs = config.http_timeout_secs,
        "fetch run initialized"
    );

    runtime::fetch(&config, &credentials).map(|_| ())
}

pub fn run_diff() -> Result<(), AppError> {
    bootstrap()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        snapshot_file = %config.snapshot_file.display(),
        flag_new_fields = config.flag_new_fields,
        extra_ignored_fields = config.extra_ignored_fields.len(),
        "diff run initialized"
    );

    print!("{}", runtime::diff_output(&config)?);
    Ok(())
}

// `.env` is read first so a `RUST_LOG` set there reaches the subscriber.
fn bootstrap() -> Result<(), AppError> {
    let dotenv = match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(error) if error.not_found() => None,
        Err(error) => return Err(AppError::config(error)),
    };

    logging::init()?;

    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    Ok(())
}
