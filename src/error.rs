//! Error taxonomy for the detector pipeline and the aggregation server.

use thiserror::Error;

/// Errors surfaced by edge-side components (C1-C7).
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("acquisition unavailable: {0}")]
    AcquisitionUnavailable(String),

    #[error("acquisition timed out after {0:?}")]
    AcquisitionTimeout(std::time::Duration),

    #[error("malformed sample: missing field `{0}` required by detector `{1}`")]
    MalformedSample(&'static str, &'static str),

    #[error("tower id empty")]
    InvalidTowerId,

    #[error("model load failure: {0}")]
    ModelLoadFailure(String),

    #[error("model fit failure: {0}")]
    ModelFitFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EdgeError {
    /// Whether the orchestrator should keep running after this error.
    /// Per the error-handling design, only a handful of conditions are
    /// fatal; everything else degrades gracefully.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EdgeError::AcquisitionUnavailable(_)
                | EdgeError::AcquisitionTimeout(_)
                | EdgeError::MalformedSample(_, _)
                | EdgeError::ModelLoadFailure(_)
                | EdgeError::ModelFitFailure(_)
        )
    }
}

/// Errors surfaced by the aggregation server (C8-C11).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("bind failure on {0}: {1}")]
    BindFailure(String, std::io::Error),

    #[error("database open failure: {0}")]
    DatabaseOpenFailure(String),

    #[error("api key file path `{0}` missing and could not be created: {1}")]
    ApiKeyFileUnavailable(String, std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServerError {
    /// Storage failures get one retry per the propagation policy; all other
    /// variants are either immediately fatal or immediately recoverable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServerError::StorageFailure(_) | ServerError::Database(_))
    }

    /// Whether this error should terminate the process (port bind failure,
    /// unrecoverable database open, missing/uncreatable API-key path).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::BindFailure(_, _)
                | ServerError::DatabaseOpenFailure(_)
                | ServerError::ApiKeyFileUnavailable(_, _)
        )
    }
}
