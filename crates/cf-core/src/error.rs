//! Error types for the Unified Audio Analysis Engine

use thiserror::Error;

/// The closed set of error kinds the engine's public API can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("session not found")]
    SessionNotFound,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("processing error: {0}")]
    ProcessingError(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("engine initialization failed: {0}")]
    InitFailed(String),

    #[error("session already finalized")]
    AlreadyFinalized,
}

/// Result type alias used across the engine's public API.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<hound::Error> for EngineError {
    fn from(e: hound::Error) -> Self {
        EngineError::ProcessingError(format!("wav decode failed: {e}"))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::ProcessingError(format!("io error: {e}"))
    }
}
