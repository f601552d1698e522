//! CLI error types.

use thiserror::Error;
use waf_live::LiveError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The feed client or REST client failed.
    #[error(transparent)]
    Live(#[from] LiveError),
    /// Invalid configuration or arguments.
    #[error("configuration error: {0}")]
    Config(String),
    /// Reconnection gave up.
    #[error("feed failed: {0}")]
    Feed(String),
    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
