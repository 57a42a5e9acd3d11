use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("fetch run aborted: {0}")]
    Fetch(String),
    #[error("snapshot unavailable: {0}")]
    Snapshot(String),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn fetch<E: std::fmt::Display>(error: E) -> Self {
        Self::Fetch(error.to_string())
    }

    pub fn snapshot<E: std::fmt::Display>(error: E) -> Self {
        Self::Snapshot(error.to_string())
    }
}
