//! Error types for media-relay

use thiserror::Error;

/// Main error type for media-relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream resolution failed: {0}")]
    UpstreamResolution(String),

    #[error("Unparsable upstream response: {0}")]
    UnparsableResponse(String),

    #[error("Failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process exited with {code:?}: {detail}")]
    ProcessExecution { code: Option<i32>, detail: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Artifact creation failed: {0}")]
    ArtifactCreation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl RelayError {
    /// HTTP status this error is reported with at the request boundary
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidInput(_) | RelayError::UrlError(_) => 400,
            RelayError::Timeout(_) => 504,
            _ => 500,
        }
    }
}
