//! SockJS XHR polling transport.
//!
//! A session lives at `<endpoint>/<server-id>/<session-id>`. Reads are
//! long-poll POSTs to `xhr`; writes are POSTs of a JSON array to
//! `xhr_send`. A background task keeps one poll outstanding and feeds a
//! channel, which keeps [`Transport::recv`] cancel safe.

use rand::Rng;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;
use waf_proto::sockjs::{encode_send, parse_response};
use waf_proto::stomp::parse_frames;
use waf_proto::{Frame, SockJsFrame, StompItem};

use super::{Connector, Endpoint, Inbound, Transport, with_segment};
use crate::error::LiveError;

const INBOUND_BUFFER: usize = 64;

/// Opens SockJS polling sessions against an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct PollingConnector {
    endpoint: Endpoint,
    http: Client,
}

impl PollingConnector {
    /// Create a connector with a default HTTP client.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    /// Create a connector sharing `http`.
    #[must_use]
    pub const fn with_client(endpoint: Endpoint, http: Client) -> Self {
        Self { endpoint, http }
    }
}

impl Connector for PollingConnector {
    type Transport = PollingTransport;

    async fn open(&self, credential: &str) -> Result<PollingTransport, LiveError> {
        let server_id = format!("{:03}", rand::thread_rng().gen_range(0..1000));
        let session_id = Uuid::new_v4().simple().to_string();
        let session = self
            .endpoint
            .polling_session_url(&server_id, &session_id, credential);
        let xhr = with_segment(&session, "xhr");
        debug!(host = %self.endpoint.host(), server_id = %server_id, "opening sockjs session");

        let body = poll_once(&self.http, &xhr).await?;
        match parse_response(&body)?.first() {
            Some(SockJsFrame::Open) => {}
            Some(SockJsFrame::Close { code, reason }) => {
                return Err(LiveError::Handshake(format!(
                    "sockjs session refused ({code}): {reason}"
                )));
            }
            _ => {
                return Err(LiveError::Handshake(
                    "sockjs session did not open".to_string(),
                ));
            }
        }

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let poller = tokio::spawn(poll_loop(self.http.clone(), xhr, tx));
        Ok(PollingTransport {
            http: self.http.clone(),
            send_url: with_segment(&session, "xhr_send"),
            rx,
            poller,
        })
    }

    fn host(&self) -> String {
        self.endpoint.host()
    }
}

/// An open SockJS polling session.
#[derive(Debug)]
pub struct PollingTransport {
    http: Client,
    send_url: Url,
    rx: mpsc::Receiver<Result<Inbound, LiveError>>,
    poller: JoinHandle<()>,
}

impl PollingTransport {
    async fn post(&self, messages: &[String]) -> Result<(), LiveError> {
        let body = encode_send(messages)?;
        self.http
            .post(self.send_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Transport for PollingTransport {
    async fn send(&mut self, frame: &Frame) -> Result<(), LiveError> {
        trace!(command = %frame.command, "sending frame");
        self.post(&[frame.encode()]).await
    }

    async fn send_heartbeat(&mut self) -> Result<(), LiveError> {
        self.post(&["\n".to_string()]).await
    }

    async fn recv(&mut self) -> Option<Result<Inbound, LiveError>> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.poller.abort();
        self.rx.close();
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn poll_once(http: &Client, xhr: &Url) -> Result<String, LiveError> {
    let body = http
        .post(xhr.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

async fn poll_loop(http: Client, xhr: Url, tx: mpsc::Sender<Result<Inbound, LiveError>>) {
    loop {
        let body = match poll_once(&http, &xhr).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "sockjs poll failed");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let frames = match parse_response(&body) {
            Ok(frames) => frames,
            Err(e) => {
                if tx.send(Ok(Inbound::Malformed(e))).await.is_err() {
                    return;
                }
                continue;
            }
        };

        for frame in frames {
            let items = match frame {
                SockJsFrame::Open => continue,
                SockJsFrame::Heartbeat => vec![Inbound::HeartBeat],
                SockJsFrame::Messages(messages) => {
                    messages.iter().map(String::as_str).flat_map(decode).collect()
                }
                SockJsFrame::Close { code, reason } => {
                    debug!(code, reason = %reason, "sockjs session closed by server");
                    return;
                }
            };
            for item in items {
                if tx.send(Ok(item)).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn decode(message: &str) -> Vec<Inbound> {
    match parse_frames(message) {
        Ok(items) => items
            .into_iter()
            .map(|item| match item {
                StompItem::HeartBeat => Inbound::HeartBeat,
                StompItem::Frame(frame) => Inbound::Frame(frame),
            })
            .collect(),
        Err(e) => vec![Inbound::Malformed(e)],
    }
}
