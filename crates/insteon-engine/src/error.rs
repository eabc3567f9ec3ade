//! Engine error types.

use insteon_message::Address;
use thiserror::Error;

/// Errors reported to intent callers, either synchronously or through a
/// command completion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The device rejected the command and retries are exhausted.
    #[error("{device} rejected command {cmd1:#04x} after {attempts} attempts")]
    Nak {
        /// Target device.
        device: Address,
        /// Command that was rejected.
        cmd1: u8,
        /// Number of times the command was sent.
        attempts: u32,
    },

    /// No reply arrived and retries are exhausted.
    #[error("no reply from {device} to command {cmd1:#04x} after {attempts} attempts")]
    Timeout {
        /// Target device.
        device: Address,
        /// Command that went unanswered.
        cmd1: u8,
        /// Number of times the command was sent.
        attempts: u32,
    },

    /// The device was removed while the command was outstanding.
    #[error("command {cmd1:#04x} to {device} cancelled")]
    Cancelled {
        /// Target device.
        device: Address,
        /// Command that was cancelled.
        cmd1: u8,
    },

    /// The request could not be sent as configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A step of a command sequence failed.
    #[error("step {step} ({label}) failed: {source}")]
    StepFailed {
        /// Zero-based index of the failed step.
        step: usize,
        /// Label given when the step was added.
        label: String,
        /// Why the step failed.
        source: Box<EngineError>,
    },

    /// The link database collaborator reported a failure.
    #[error("link database error: {0}")]
    LinkDb(String),
}

impl EngineError {
    /// Error for an intent addressed to a device the modem does not know.
    pub fn unknown_device(address: Address) -> Self {
        EngineError::Configuration(format!("no device with address {address}"))
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }
}

/// A signal subscriber failed while handling an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subscriber failed: {0}")]
pub struct SignalError(pub String);

impl SignalError {
    /// Create a subscriber error.
    pub fn new(message: impl Into<String>) -> Self {
        SignalError(message.into())
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
