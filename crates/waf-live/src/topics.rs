//! Dashboard topic table and payload decoding.

use std::sync::Arc;

use waf_proto::types::decode_record;
use waf_proto::{Frame, ProtoError};

use crate::events::{EventKind, LiveEvent};

/// One subscribed topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicRoute {
    /// STOMP destination.
    pub destination: &'static str,
    /// Subscription id sent in SUBSCRIBE.
    pub subscription_id: &'static str,
    /// Event emitted for messages on this topic.
    pub kind: EventKind,
}

/// Topics subscribed after every successful handshake.
pub const DASHBOARD_TOPICS: [TopicRoute; 4] = [
    TopicRoute {
        destination: "/topic/dashboard/attacks",
        subscription_id: "sub-0",
        kind: EventKind::AttackBlocked,
    },
    TopicRoute {
        destination: "/topic/dashboard/traffic",
        subscription_id: "sub-1",
        kind: EventKind::TrafficUpdate,
    },
    TopicRoute {
        destination: "/topic/dashboard/stats",
        subscription_id: "sub-2",
        kind: EventKind::StatsUpdate,
    },
    TopicRoute {
        destination: "/topic/dashboard/status",
        subscription_id: "sub-3",
        kind: EventKind::StatusChange,
    },
];

/// Maps inbound MESSAGE frames to events.
#[derive(Debug, Clone, Copy)]
pub struct TopicRouter {
    routes: &'static [TopicRoute],
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::dashboard()
    }
}

impl TopicRouter {
    /// Router over the dashboard topics.
    #[must_use]
    pub const fn dashboard() -> Self {
        Self {
            routes: &DASHBOARD_TOPICS,
        }
    }

    /// Routes in subscription order.
    #[must_use]
    pub const fn routes(&self) -> &'static [TopicRoute] {
        self.routes
    }

    /// SUBSCRIBE frames for every route.
    #[must_use]
    pub fn subscribe_frames(&self) -> Vec<Frame> {
        self.routes
            .iter()
            .map(|route| Frame::subscribe(route.subscription_id, route.destination))
            .collect()
    }

    /// Route for a MESSAGE frame: by `subscription`, else by `destination`.
    #[must_use]
    pub fn route_for(&self, frame: &Frame) -> Option<&'static TopicRoute> {
        if let Some(id) = frame.header("subscription") {
            if let Some(route) = self.routes.iter().find(|r| r.subscription_id == id) {
                return Some(route);
            }
        }
        let destination = frame.header("destination")?;
        self.routes.iter().find(|r| r.destination == destination)
    }

    /// Decode a MESSAGE frame into its event.
    ///
    /// Returns `None` when the frame belongs to no known topic.
    pub fn decode(&self, frame: &Frame) -> Option<Result<LiveEvent, ProtoError>> {
        let route = self.route_for(frame)?;
        Some(decode_payload(route.kind, &frame.body))
    }
}

/// Decode a topic payload for `kind`.
///
/// # Errors
///
/// Returns an error if the body does not match the topic's record type or
/// `kind` is not a data event.
pub fn decode_payload(kind: EventKind, body: &str) -> Result<LiveEvent, ProtoError> {
    let event = match kind {
        EventKind::AttackBlocked => LiveEvent::AttackBlocked(Arc::new(decode_record(body)?)),
        EventKind::TrafficUpdate => LiveEvent::TrafficUpdate(Arc::new(decode_record(body)?)),
        EventKind::StatsUpdate => LiveEvent::StatsUpdate(Arc::new(decode_record(body)?)),
        EventKind::StatusChange => LiveEvent::StatusChange(Arc::new(decode_record(body)?)),
        other => {
            return Err(ProtoError::Validation(format!(
                "{other} is not a topic event"
            )));
        }
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waf_proto::Command;
    use waf_proto::WafState;

    fn message(headers: &[(&str, &str)], body: &str) -> Frame {
        headers
            .iter()
            .fold(Frame::new(Command::Message), |frame, (k, v)| {
                frame.with_header(*k, *v)
            })
            .with_body(body)
    }

    #[test]
    fn test_subscribe_frames_cover_all_topics() {
        let frames = TopicRouter::dashboard().subscribe_frames();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].header("id"), Some("sub-0"));
        assert_eq!(frames[0].header("destination"), Some("/topic/dashboard/attacks"));
        assert_eq!(frames[3].header("destination"), Some("/topic/dashboard/status"));
        assert!(frames.iter().all(|f| f.command == Command::Subscribe));
    }

    #[test]
    fn test_route_prefers_subscription_header() {
        let router = TopicRouter::dashboard();
        let frame = message(
            &[("subscription", "sub-2"), ("destination", "/topic/dashboard/traffic")],
            "{}",
        );
        assert_eq!(
            router.route_for(&frame).map(|r| r.kind),
            Some(EventKind::StatsUpdate)
        );
    }

    #[test]
    fn test_route_falls_back_to_destination() {
        let router = TopicRouter::dashboard();
        let frame = message(&[("destination", "/topic/dashboard/traffic")], "{}");
        assert_eq!(
            router.route_for(&frame).map(|r| r.kind),
            Some(EventKind::TrafficUpdate)
        );
        let unknown = message(&[("destination", "/topic/other")], "{}");
        assert!(router.route_for(&unknown).is_none());
        assert!(router.decode(&unknown).is_none());
    }

    #[test]
    fn test_decode_status_patch() {
        let frame = message(&[("subscription", "sub-3")], r#"{"status":"maintenance"}"#);
        match TopicRouter::dashboard().decode(&frame) {
            Some(Ok(LiveEvent::StatusChange(patch))) => {
                assert_eq!(patch.status, Some(WafState::Maintenance));
            }
            other => panic!("expected StatusChange, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_bad_body_is_error() {
        let frame = message(&[("subscription", "sub-0")], "not json");
        assert!(matches!(
            TopicRouter::dashboard().decode(&frame),
            Some(Err(ProtoError::Decoding(_)))
        ));
    }

    #[test]
    fn test_decode_payload_rejects_lifecycle_kind() {
        assert!(decode_payload(EventKind::Connected, "{}").is_err());
    }
}
