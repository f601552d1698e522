//! # waf-proto
//!
//! Wire-level definitions for the WAF console live feed.
//!
//! - [`types`]: records pushed on the dashboard topics and returned by the
//!   REST snapshot endpoints.
//! - [`stomp`]: STOMP 1.2 frame encoding and parsing.
//! - [`sockjs`]: SockJS framing used by the HTTP polling fallback.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod sockjs;
pub mod stomp;
pub mod types;

pub use error::ProtoError;
pub use sockjs::SockJsFrame;
pub use stomp::{Command, Frame, HeartBeat, StompItem};
pub use types::{
    ApiResponse, AttackEvent, Severity, StatsSnapshot, StatusPatch, StatusSnapshot, TrafficSample,
    WafState,
};
