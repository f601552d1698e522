//! # waf-live
//!
//! Real-time connectivity for the WAF dashboard.
//!
//! - [`LiveClient`] keeps one STOMP session open over a WebSocket (or SockJS
//!   polling), subscribes to the dashboard topics, and reconnects on a fixed
//!   schedule when the link drops.
//! - [`EventDispatcher`] fans decoded events out to registered handlers.
//! - [`LiveStore`] folds events into bounded views and notifies watchers.
//! - [`DashboardApi`] fetches REST snapshots to seed the store.
//!
//! ```no_run
//! use waf_live::{LiveClient, LiveConfig, LiveStore};
//!
//! # async fn run() -> Result<(), waf_live::LiveError> {
//! let config = LiveConfig::default();
//! let client = LiveClient::from_config(&config)?;
//! let store = LiveStore::new(config.buffers);
//! let _binding = store.bind(client.dispatcher());
//!
//! client.connect("token").await?;
//! let view = store.snapshot();
//! println!("{} attacks, link {}", view.attacks.len(), view.link);
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod projection;
pub mod reconnect;
pub mod state;
pub mod store;
pub mod topics;
pub mod transport;

pub use api::DashboardApi;
pub use client::{ClientOptions, LiveClient};
pub use config::{LiveConfig, TransportKind};
pub use dispatcher::{DispatchOutcome, EventDispatcher, Handler, HandlerError, handler};
pub use error::LiveError;
pub use events::{ErrorSource, EventKind, LiveEvent};
pub use state::{ConnectionState, LinkIndicator};
pub use store::{DashboardView, LiveStore, StoreBinding};
pub use transport::{Connector, Endpoint, FallbackConnector, Inbound, Transport};
