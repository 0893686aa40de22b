//! Error types for tutorlens-core

use thiserror::Error;

use crate::types::SessionId;

/// Error type for engine operations.
///
/// Only structurally invalid input surfaces here. Classification misses,
/// missing metrics and empty aggregations are recovered locally.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Event or request carried an empty session id
    #[error("Event does not reference a session")]
    MissingSession,

    /// Session was never opened with the engine
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// Event was routed to the accumulator of a different session
    #[error("Session mismatch: expected {expected}, got {actual}")]
    SessionMismatch {
        expected: SessionId,
        actual: SessionId,
    },

    /// Session id is already registered to another student or course
    #[error("Session already registered with different owner: {0}")]
    SessionConflict(SessionId),

    /// Session actor is no longer running
    #[error("Session closed: {0}")]
    SessionClosed(SessionId),

    /// Assessment log operation failed
    #[error("Assessment log error: {0}")]
    Log(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
