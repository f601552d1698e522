//! # waf-live-cli
//!
//! Terminal consumer for the WAF dashboard live feed.
//!
//! - `watch` prints every feed event until interrupted
//! - `snapshot` seeds from the REST API, follows the feed briefly and
//!   prints the resulting dashboard view
//! - `init-config` writes a sample configuration file

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
