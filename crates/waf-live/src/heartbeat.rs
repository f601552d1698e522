//! STOMP heart-beat negotiation and silence detection.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use waf_proto::HeartBeat;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval at which we offer to send heart-beats.
    pub outgoing: Duration,
    /// Interval at which we want the server to send them.
    pub incoming: Duration,
    /// Missed server intervals tolerated before the link counts as dropped.
    pub grace_factor: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            outgoing: Duration::from_secs(10),
            incoming: Duration::from_secs(10),
            grace_factor: 2,
        }
    }
}

impl HeartbeatConfig {
    /// Value for the CONNECT `heart-beat` header.
    #[must_use]
    pub fn advertisement(&self) -> HeartBeat {
        HeartBeat::new(
            u64::try_from(self.outgoing.as_millis()).unwrap_or(u64::MAX),
            u64::try_from(self.incoming.as_millis()).unwrap_or(u64::MAX),
        )
    }

    /// Negotiate against the CONNECTED frame's `heart-beat` header.
    ///
    /// A missing or unparseable header disables heart-beats both ways.
    #[must_use]
    pub fn negotiate(&self, server: Option<&str>) -> NegotiatedHeartbeat {
        let server = match server.map(HeartBeat::parse) {
            Some(Ok(server)) => server,
            Some(Err(e)) => {
                debug!(error = %e, "ignoring server heart-beat header");
                HeartBeat::default()
            }
            None => HeartBeat::default(),
        };
        let (send_every, expect_every) = self.advertisement().negotiate(&server);
        NegotiatedHeartbeat {
            send_every,
            expect_every,
            grace_factor: self.grace_factor.max(1),
        }
    }
}

/// Heart-beat intervals agreed for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartbeat {
    /// How often we must send.
    pub send_every: Option<Duration>,
    /// How often the server promised to send.
    pub expect_every: Option<Duration>,
    /// Grace multiplier applied to `expect_every`.
    pub grace_factor: u32,
}

impl NegotiatedHeartbeat {
    /// Longest tolerated silence from the server.
    #[must_use]
    pub fn silence_limit(&self) -> Option<Duration> {
        self.expect_every.map(|every| every * self.grace_factor)
    }
}

/// Tracks inbound activity for one session.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    limit: Option<Duration>,
    last_seen: Instant,
}

impl HeartbeatMonitor {
    /// Start monitoring now.
    #[must_use]
    pub fn new(negotiated: &NegotiatedHeartbeat) -> Self {
        Self {
            limit: negotiated.silence_limit(),
            last_seen: Instant::now(),
        }
    }

    /// Any inbound frame or heart-beat counts as activity.
    pub fn record_activity(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Instant at which the link is considered dead, if monitoring is on.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.limit.map(|limit| self.last_seen + limit)
    }

    /// Whether the silence limit has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }
}
