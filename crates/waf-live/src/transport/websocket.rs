//! Native WebSocket transport.

use std::collections::VecDeque;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use waf_proto::stomp::parse_frames;
use waf_proto::{Frame, StompItem};

use super::{Connector, Endpoint, Inbound, Transport};
use crate::error::LiveError;

/// Opens WebSocket sessions against an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: Endpoint,
}

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn open(&self, credential: &str) -> Result<WebSocketTransport, LiveError> {
        let url = self.endpoint.websocket_url(credential);
        debug!(host = %self.endpoint.host(), "opening websocket");
        let (ws, _response) = connect_async(url.as_str()).await?;
        Ok(WebSocketTransport::new(ws))
    }

    fn host(&self) -> String {
        self.endpoint.host()
    }
}

/// A STOMP session over a WebSocket. Each text message carries one or
/// more frames.
pub struct WebSocketTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<Inbound>,
}

impl WebSocketTransport {
    fn new(ws: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            ws,
            pending: VecDeque::new(),
        }
    }

    fn queue_text(&mut self, text: &str) {
        match parse_frames(text) {
            Ok(items) => self.pending.extend(items.into_iter().map(|item| match item {
                StompItem::HeartBeat => Inbound::HeartBeat,
                StompItem::Frame(frame) => Inbound::Frame(frame),
            })),
            Err(e) => self.pending.push_back(Inbound::Malformed(e)),
        }
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: &Frame) -> Result<(), LiveError> {
        trace!(command = %frame.command, "sending frame");
        self.ws.send(Message::Text(frame.encode().into())).await?;
        Ok(())
    }

    async fn send_heartbeat(&mut self) -> Result<(), LiveError> {
        self.ws.send(Message::Text("\n".into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Inbound, LiveError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }
            match self.ws.next().await? {
                Ok(Message::Text(text)) => self.queue_text(text.as_str()),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => self.queue_text(text),
                    Err(e) => {
                        return Some(Ok(Inbound::Malformed(waf_proto::ProtoError::Decoding(
                            format!("binary message is not utf-8: {e}"),
                        ))));
                    }
                },
                Ok(Message::Ping(_) | Message::Pong(_)) => return Some(Ok(Inbound::HeartBeat)),
                Ok(Message::Close(_)) => return None,
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
