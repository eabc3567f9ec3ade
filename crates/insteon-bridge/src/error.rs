//! Error types for the bridge.

use insteon_engine::EngineError;
use thiserror::Error;

use crate::template::TemplateError;

/// Bridge failure.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// An inbound payload could not be turned into a command.
    #[error("bad payload on '{topic}': {message}")]
    Payload {
        /// Topic the payload arrived on.
        topic: String,
        /// What is wrong.
        message: String,
    },

    /// The message bus rejected an operation.
    #[error("bus error: {0}")]
    Bus(String),

    /// The configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine rejected an intent.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BridgeError {
    /// Create a payload error.
    pub fn payload(topic: &str, message: impl Into<String>) -> Self {
        BridgeError::Payload {
            topic: topic.to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config(message.into())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
