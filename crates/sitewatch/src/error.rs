use thiserror::Error;

/// Errors raised by the pipeline's collaborators.
///
/// Probe failures are not errors: they travel as `CheckResult { success: false, .. }`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("target source unavailable: {0}")]
    TargetSource(String),

    #[error("result channel error: {0}")]
    Channel(String),

    #[error("state store error: {0}")]
    StateStore(String),

    #[error("notification delivery failed: {0}")]
    Notify(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
