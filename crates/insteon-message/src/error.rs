//! Error types for insteon-message.

use thiserror::Error;

/// Errors raised while decoding frames or parsing addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Length required by the flags byte.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Frame carries bytes beyond what the flags byte allows.
    #[error("frame too long: expected {expected} bytes, got {actual}")]
    FrameTooLong {
        /// Length required by the flags byte.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Address text could not be parsed.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// Extended data block has the wrong size.
    #[error("extended data must be {expected} bytes, got {actual}")]
    InvalidDataLength {
        /// Required block size.
        expected: usize,
        /// Size supplied.
        actual: usize,
    },
}

impl FormatError {
    /// Create an invalid address error.
    pub fn invalid_address(text: impl Into<String>) -> Self {
        FormatError::InvalidAddress(text.into())
    }
}

/// Result alias for codec operations.
pub type FormatResult<T> = Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FormatError::FrameTooShort {
            expected: 23,
            actual: 9,
        };
        assert!(err.to_string().contains("expected 23"));

        let err = FormatError::invalid_address("zz.01.02");
        assert!(err.to_string().contains("zz.01.02"));
    }
}
