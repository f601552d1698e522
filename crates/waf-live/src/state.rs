//! Connection state types.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// State of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Handshake complete, topics subscribed.
    Connected,
    /// Connection dropped, a retry is scheduled.
    Reconnecting,
    /// Retries exhausted or closed by the caller.
    Failed,
}

impl ConnectionState {
    /// Whether a new `connect` may start from this state.
    #[must_use]
    pub const fn accepts_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    /// Indicator shown for this state.
    #[must_use]
    pub const fn indicator(self) -> LinkIndicator {
        match self {
            Self::Connected => LinkIndicator::Live,
            Self::Connecting | Self::Reconnecting => LinkIndicator::Reconnecting,
            Self::Disconnected | Self::Failed => LinkIndicator::Offline,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Atomic wrapper for connection state.
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> ConnectionState {
        Self::decode(self.0.load(Ordering::SeqCst))
    }

    /// Store a new state.
    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }

    /// Move to `next` only if the current state accepts a connect.
    ///
    /// Returns the state observed when the transition was refused.
    pub fn begin_connect(&self, next: ConnectionState) -> Result<(), ConnectionState> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                Self::decode(raw)
                    .accepts_connect()
                    .then_some(next as u32)
            })
            .map(|_| ())
            .map_err(Self::decode)
    }

    const fn decode(raw: u32) -> ConnectionState {
        match raw {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Failed,
        }
    }
}

/// Three-way link indicator for the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkIndicator {
    /// Receiving live data.
    Live,
    /// Trying to (re)establish the feed.
    Reconnecting,
    /// No feed.
    #[default]
    Offline,
}

impl fmt::Display for LinkIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}
