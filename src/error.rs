use std::path::PathBuf;
use std::time::Duration;

use crate::app::Stage;

/// Errors raised by the individual upload components.
///
/// HTTP error statuses are not represented here: a 4xx or 5xx response is a
/// completed round trip and is returned as an [`UploadResponse`](crate::UploadResponse).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Missing configuration value: {0} is not set")]
    MissingConfig(&'static str),
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("Unable to read file {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Request signing failed: {0}")]
    Signing(String),
    #[error("Request timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },
    #[error("Network request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid value for header {name}")]
    InvalidHeader { name: &'static str },
    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

impl UploadError {
    pub(crate) fn signing(message: impl Into<String>) -> Self {
        UploadError::Signing(message.into())
    }
}

/// An [`UploadError`] annotated with the last stage the run reached.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct UploadFailure {
    pub stage: Stage,
    #[source]
    pub error: UploadError,
}

pub type Result<T, E = UploadError> = std::result::Result<T, E>;
