//! Events delivered to subscribers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use waf_proto::{AttackEvent, StatsSnapshot, StatusPatch, TrafficSample};

/// Names under which handlers register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Session established.
    Connected,
    /// Session lost or closed.
    Disconnected,
    /// Retry scheduled.
    Reconnecting,
    /// Retries exhausted.
    Failed,
    /// Handshake, transport or server error.
    Error,
    /// New attack record.
    AttackBlocked,
    /// New traffic sample.
    TrafficUpdate,
    /// New stats snapshot.
    StatsUpdate,
    /// Partial status update.
    StatusChange,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [Self; 9] = [
        Self::Connected,
        Self::Disconnected,
        Self::Reconnecting,
        Self::Failed,
        Self::Error,
        Self::AttackBlocked,
        Self::TrafficUpdate,
        Self::StatsUpdate,
        Self::StatusChange,
    ];

    /// Wire-style event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::AttackBlocked => "attackBlocked",
            Self::TrafficUpdate => "trafficUpdate",
            Self::StatsUpdate => "statsUpdate",
            Self::StatusChange => "statusChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown event: {s}"))
    }
}

/// Where an error event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// Opening the session failed.
    Handshake,
    /// The transport failed or delivered a malformed frame.
    Transport,
    /// The server sent a STOMP ERROR frame.
    Server,
}

/// An event with its payload.
///
/// Payloads are shared, so handlers cannot mutate what other handlers see.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Session established.
    Connected,
    /// Session lost or closed.
    Disconnected {
        /// Why the session ended.
        reason: String,
    },
    /// Retry scheduled.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Delay before the retry.
        delay: Duration,
    },
    /// Retries exhausted.
    Failed {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last_error: String,
    },
    /// Handshake, transport or server error.
    Error {
        /// Origin of the error.
        source: ErrorSource,
        /// Diagnostic text.
        message: String,
    },
    /// New attack record.
    AttackBlocked(Arc<AttackEvent>),
    /// New traffic sample.
    TrafficUpdate(Arc<TrafficSample>),
    /// New stats snapshot.
    StatsUpdate(Arc<StatsSnapshot>),
    /// Partial status update.
    StatusChange(Arc<StatusPatch>),
}

impl LiveEvent {
    /// Kind used to route this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Failed { .. } => EventKind::Failed,
            Self::Error { .. } => EventKind::Error,
            Self::AttackBlocked(_) => EventKind::AttackBlocked,
            Self::TrafficUpdate(_) => EventKind::TrafficUpdate,
            Self::StatsUpdate(_) => EventKind::StatsUpdate,
            Self::StatusChange(_) => EventKind::StatusChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>(), Ok(kind));
        }
        assert!("attack_blocked".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_of_payload() {
        let event = LiveEvent::StatsUpdate(Arc::new(StatsSnapshot::default()));
        assert_eq!(event.kind(), EventKind::StatsUpdate);
        assert_eq!(event.kind().to_string(), "statsUpdate");

        let event = LiveEvent::Reconnecting {
            attempt: 2,
            delay: Duration::from_secs(5),
        };
        assert_eq!(event.kind(), EventKind::Reconnecting);
    }
}
