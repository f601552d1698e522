//! Error types for the live feed client.

use std::time::Duration;

use thiserror::Error;
use waf_proto::ProtoError;

/// Errors that can occur while connecting to or talking with the feed.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The STOMP handshake was refused or broke off.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Opening the session took longer than the connect timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// A connect is already in flight.
    #[error("connection attempt already in progress")]
    Busy,

    /// `disconnect` was called while the connect was in flight.
    #[error("connect cancelled by disconnect")]
    Cancelled,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// REST snapshot request failed.
    #[error("http error: {0}")]
    Http(String),

    /// Wire protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for LiveError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for LiveError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LiveError::Handshake("bad token".into()).to_string(),
            "handshake failed: bad token"
        );
        assert_eq!(
            LiveError::Timeout(Duration::from_secs(10)).to_string(),
            "connect timed out after 10s"
        );
        assert_eq!(
            LiveError::Cancelled.to_string(),
            "connect cancelled by disconnect"
        );
    }

    #[test]
    fn test_proto_error_converts() {
        let err: LiveError = ProtoError::MissingHeader("destination").into();
        assert!(matches!(err, LiveError::Protocol(_)));
        assert_eq!(
            err.to_string(),
            "protocol error: missing required header: destination"
        );
    }
}
