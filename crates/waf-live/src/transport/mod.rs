//! Transports carrying STOMP frames to the feed server.
//!
//! A [`Connector`] opens a fresh [`Transport`] for every session. Two
//! transports exist: a native WebSocket and SockJS XHR polling for
//! networks that block the upgrade. [`FallbackConnector`] tries them in
//! that order.

mod fallback;
mod polling;
mod websocket;

use std::future::Future;

use url::Url;
use waf_proto::{Frame, ProtoError};

use crate::error::LiveError;

pub use fallback::{AnyTransport, FallbackConnector};
pub use polling::{PollingConnector, PollingTransport};
pub use websocket::{WebSocketConnector, WebSocketTransport};

/// One item received from a transport.
#[derive(Debug)]
pub enum Inbound {
    /// Heart-beat or keepalive.
    HeartBeat,
    /// A complete STOMP frame.
    Frame(Frame),
    /// A message that could not be parsed as STOMP.
    Malformed(ProtoError),
}

/// An open, bidirectional frame channel.
pub trait Transport: Send + 'static {
    /// Send one frame.
    fn send(&mut self, frame: &Frame) -> impl Future<Output = Result<(), LiveError>> + Send;

    /// Send a bare heart-beat.
    fn send_heartbeat(&mut self) -> impl Future<Output = Result<(), LiveError>> + Send;

    /// Receive the next item, or `None` once the peer has closed.
    ///
    /// Must be cancel safe: dropping the future loses nothing.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, LiveError>>> + Send;

    /// Close the transport. Errors are ignored.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports for a session.
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Open a transport authenticated with `credential`.
    fn open(&self, credential: &str)
    -> impl Future<Output = Result<Self::Transport, LiveError>> + Send;

    /// Value for the CONNECT `host` header.
    fn host(&self) -> String;
}

/// Base URL of the feed plus the URL shapes derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Wrap a base endpoint such as `http://localhost:8081/ws`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL scheme is not http, https, ws or wss.
    pub fn new(base: Url) -> Result<Self, LiveError> {
        if !matches!(base.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(LiveError::Config(format!(
                "unsupported endpoint scheme: {}",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(LiveError::Config(format!("endpoint cannot be a base: {base}")));
        }
        Ok(Self { base })
    }

    /// Parse and wrap a base endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or unsupported.
    pub fn parse(raw: &str) -> Result<Self, LiveError> {
        let url =
            Url::parse(raw).map_err(|e| LiveError::Config(format!("invalid endpoint '{raw}': {e}")))?;
        Self::new(url)
    }

    /// Host name used in the CONNECT frame.
    #[must_use]
    pub fn host(&self) -> String {
        self.base.host_str().unwrap_or("localhost").to_string()
    }

    /// Native WebSocket URL: `ws(s)://host/ws/websocket?token=...`.
    #[must_use]
    pub fn websocket_url(&self, credential: &str) -> Url {
        let scheme = match self.base.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        self.derive(scheme, &["websocket"], credential)
    }

    /// SockJS session base: `http(s)://host/ws/<server>/<session>`.
    #[must_use]
    pub fn polling_session_url(&self, server_id: &str, session_id: &str, credential: &str) -> Url {
        let scheme = match self.base.scheme() {
            "https" | "wss" => "https",
            _ => "http",
        };
        self.derive(scheme, &[server_id, session_id], credential)
    }

    fn derive(&self, scheme: &str, segments: &[&str], credential: &str) -> Url {
        let mut url = self.base.clone();
        // Swapping between special schemes never fails.
        let _ = url.set_scheme(scheme);
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut().append_pair("token", credential);
        url
    }
}

/// Append a path segment to a session URL, keeping the query.
pub(crate) fn with_segment(session: &Url, segment: &str) -> Url {
    let mut url = session.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().push(segment);
    }
    url
}
