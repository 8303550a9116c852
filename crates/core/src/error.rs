// Error handling for the playback session controller

use crate::engine::EngineFailure;
use serde::Serialize;

/// Errors surfaced to the host, either as a rejected command acknowledgment
/// or as an `error` notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// Bad or unsupported `init` options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed stream URL or file path
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failure reported by the media engine
    #[error("Engine error: {0}")]
    Engine(EngineFailure),

    /// Capability denied by the host device (audio session, remote control, network)
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
}

/// Error kind as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ConfigurationError,
    InvalidSourceError,
    InvalidStateError,
    EngineError,
    ResourceUnavailableError,
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::Configuration(_) => ErrorKind::ConfigurationError,
            PlayerError::InvalidSource(_) => ErrorKind::InvalidSourceError,
            PlayerError::InvalidState(_) => ErrorKind::InvalidStateError,
            PlayerError::Engine(_) => ErrorKind::EngineError,
            PlayerError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailableError,
        }
    }

    /// Human-readable detail without the kind prefix
    pub fn detail(&self) -> String {
        match self {
            PlayerError::Configuration(msg)
            | PlayerError::InvalidSource(msg)
            | PlayerError::InvalidState(msg)
            | PlayerError::ResourceUnavailable(msg) => msg.clone(),
            PlayerError::Engine(failure) => failure.to_string(),
        }
    }
}

impl From<EngineFailure> for PlayerError {
    fn from(failure: EngineFailure) -> Self {
        PlayerError::Engine(failure)
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, PlayerError>;
