use crate::prompt::GenerationRequest;
use crate::store::GenerationResult;
use async_trait::async_trait;
use thiserror::Error;

/// Failures of a single generation call
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-success status
    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// DNS, connection, timeout or stream interruption
    #[error("transport error: {0}")]
    Transport(String),

    /// Success status, but the payload did not have the expected shape
    #[error("unexpected response from backend: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

// Base trait for generation backends: text prompt in, complete HTML out
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run one generation to completion
    ///
    /// Either the whole document is returned or an error; never partial text.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, BackendError>;
}
