//! CLI command implementations.
//!
//! - [`watch`] - Stream feed events until interrupted
//! - [`snapshot`] - Print the dashboard view
//! - [`init_config`] - Write a sample configuration

pub mod init_config;
pub mod snapshot;
pub mod watch;

pub use init_config::InitConfigCommand;
pub use snapshot::SnapshotCommand;
pub use watch::WatchCommand;
