//! Error types for the waf-proto crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a record or frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a record or frame.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Unknown STOMP command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtoError::InvalidCommand("FOO".into()).to_string(),
            "invalid command: FOO"
        );
        assert_eq!(
            ProtoError::MissingHeader("destination").to_string(),
            "missing required header: destination"
        );
        assert_eq!(
            ProtoError::Decoding("bad json".into()).to_string(),
            "decoding error: bad json"
        );
    }
}
