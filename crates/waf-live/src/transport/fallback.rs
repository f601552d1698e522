//! Transport selection with WebSocket-to-polling fallback.

use tracing::{info, warn};
use waf_proto::Frame;

use super::{
    Connector, Endpoint, Inbound, PollingConnector, PollingTransport, Transport,
    WebSocketConnector, WebSocketTransport,
};
use crate::config::{LiveConfig, TransportKind};
use crate::error::LiveError;

/// Opens the transport chosen by [`TransportKind`].
#[derive(Debug, Clone)]
pub struct FallbackConnector {
    kind: TransportKind,
    websocket: WebSocketConnector,
    polling: PollingConnector,
}

impl FallbackConnector {
    /// Create a connector for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint, kind: TransportKind) -> Self {
        Self {
            kind,
            websocket: WebSocketConnector::new(endpoint.clone()),
            polling: PollingConnector::new(endpoint),
        }
    }

    /// Create a connector from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid.
    pub fn from_config(config: &LiveConfig) -> Result<Self, LiveError> {
        let endpoint = Endpoint::new(config.endpoint_url()?)?;
        Ok(Self::new(endpoint, config.transport))
    }

    /// Selected transport kind.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }
}

impl Connector for FallbackConnector {
    type Transport = AnyTransport;

    async fn open(&self, credential: &str) -> Result<AnyTransport, LiveError> {
        match self.kind {
            TransportKind::WebSocket => self
                .websocket
                .open(credential)
                .await
                .map(AnyTransport::WebSocket),
            TransportKind::Polling => self
                .polling
                .open(credential)
                .await
                .map(AnyTransport::Polling),
            TransportKind::Auto => match self.websocket.open(credential).await {
                Ok(transport) => Ok(AnyTransport::WebSocket(transport)),
                Err(ws_err) => {
                    warn!(error = %ws_err, "websocket unavailable, falling back to polling");
                    let transport = self.polling.open(credential).await.map_err(|e| {
                        LiveError::Transport(format!("websocket: {ws_err}; polling: {e}"))
                    })?;
                    info!("using sockjs polling transport");
                    Ok(AnyTransport::Polling(transport))
                }
            },
        }
    }

    fn host(&self) -> String {
        self.websocket.host()
    }
}

/// Either transport.
#[derive(Debug)]
pub enum AnyTransport {
    /// Native WebSocket.
    WebSocket(WebSocketTransport),
    /// SockJS polling.
    Polling(PollingTransport),
}

impl Transport for AnyTransport {
    async fn send(&mut self, frame: &Frame) -> Result<(), LiveError> {
        match self {
            Self::WebSocket(t) => t.send(frame).await,
            Self::Polling(t) => t.send(frame).await,
        }
    }

    async fn send_heartbeat(&mut self) -> Result<(), LiveError> {
        match self {
            Self::WebSocket(t) => t.send_heartbeat().await,
            Self::Polling(t) => t.send_heartbeat().await,
        }
    }

    async fn recv(&mut self) -> Option<Result<Inbound, LiveError>> {
        match self {
            Self::WebSocket(t) => t.recv().await,
            Self::Polling(t) => t.recv().await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::WebSocket(t) => t.close().await,
            Self::Polling(t) => t.close().await,
        }
    }
}
