//! Reconnecting live feed client.
//!
//! [`LiveClient::connect`] opens a transport, performs the STOMP handshake
//! and subscribes to the dashboard topics. A background task then owns the
//! session: it routes inbound frames to the [`EventDispatcher`], keeps
//! heart-beats flowing and, when the link drops, retries on the fixed
//! schedule of the [`ReconnectPolicy`] until it gives up.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use waf_proto::types::encode_record;
use waf_proto::{Command, Frame};

use crate::config::LiveConfig;
use crate::dispatcher::{EventDispatcher, Handler};
use crate::error::LiveError;
use crate::events::{ErrorSource, EventKind, LiveEvent};
use crate::heartbeat::{HeartbeatConfig, HeartbeatMonitor, NegotiatedHeartbeat};
use crate::reconnect::{ReconnectPolicy, RetryDecision};
use crate::state::{AtomicConnectionState, ConnectionState, LinkIndicator};
use crate::topics::TopicRouter;
use crate::transport::{Connector, FallbackConnector, Inbound, Transport};

/// Tunables for [`LiveClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Retry schedule after a drop.
    pub reconnect: ReconnectPolicy,
    /// Heart-beat offer and silence tolerance.
    pub heartbeat: HeartbeatConfig,
    /// Upper bound on opening a session, handshake included.
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatConfig::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&LiveConfig> for ClientOptions {
    fn from(config: &LiveConfig) -> Self {
        Self {
            reconnect: config.reconnect_policy(),
            heartbeat: config.heartbeat_config(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Client for the dashboard live feed.
///
/// Cloning yields another handle to the same connection.
pub struct LiveClient<C: Connector = FallbackConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for LiveClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LiveClient<FallbackConnector> {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &LiveConfig) -> Result<Self, LiveError> {
        config.validate()?;
        let connector = FallbackConnector::from_config(config)?;
        Ok(Self::new(connector, ClientOptions::from(config)))
    }
}

impl<C: Connector> LiveClient<C> {
    /// Create a client with its own dispatcher.
    #[must_use]
    pub fn new(connector: C, options: ClientOptions) -> Self {
        Self::with_dispatcher(connector, options, EventDispatcher::new())
    }

    /// Create a client that emits through `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(connector: C, options: ClientOptions, dispatcher: EventDispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                options,
                dispatcher,
                router: TopicRouter::dashboard(),
                state: AtomicConnectionState::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                session: Mutex::new(None),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Connect and subscribe to the dashboard topics.
    ///
    /// Resolves once the handshake succeeds. Already connected is a no-op;
    /// a connect already in flight yields [`LiveError::Busy`].
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened, the server
    /// refuses the handshake, the connect timeout passes, or
    /// [`disconnect`](Self::disconnect) is called before it completes.
    pub async fn connect(&self, credential: &str) -> Result<(), LiveError> {
        let inner = &self.inner;
        if let Err(current) = inner.state.begin_connect(ConnectionState::Connecting) {
            return if current == ConnectionState::Connected {
                debug!("already connected");
                Ok(())
            } else {
                Err(LiveError::Busy)
            };
        }

        inner.attempts.store(0, Ordering::SeqCst);
        let id = inner.next_session.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stale = inner.session.lock().replace(SessionSlot {
            id,
            cancel: cancel.clone(),
            outbound: outbound_tx,
        });
        if let Some(stale) = stale {
            stale.cancel.cancel();
        }
        info!(session = id, "connecting to live feed");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LiveError::Cancelled),
            result = inner.handshake(credential) => result,
        };

        match result {
            Ok(mut established) => {
                if !inner.store_if_current(id, ConnectionState::Connected) {
                    established.transport.close().await;
                    return Err(LiveError::Cancelled);
                }
                inner.on_connected();
                let task = Arc::clone(inner);
                let credential = credential.to_string();
                tokio::spawn(async move {
                    task.supervise(id, established, credential, outbound_rx, cancel)
                        .await;
                });
                Ok(())
            }
            Err(_) if cancel.is_cancelled() => {
                debug!(session = id, "connect cancelled");
                Err(LiveError::Cancelled)
            }
            Err(e) => {
                if !inner.store_if_current(id, ConnectionState::Failed) {
                    return Err(LiveError::Cancelled);
                }
                warn!(session = id, error = %e, "live feed handshake failed");
                inner.release(id);
                inner.dispatcher.emit(&LiveEvent::Error {
                    source: ErrorSource::Handshake,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tear down the connection and suppress further retries.
    ///
    /// Safe from any state: a pending retry timer is cancelled and an
    /// in-flight [`connect`](Self::connect) resolves with
    /// [`LiveError::Cancelled`].
    pub fn disconnect(&self) {
        let inner = &self.inner;
        let (session, previous) = {
            let mut slot = inner.session.lock();
            let previous = inner.state.load();
            inner.state.store(ConnectionState::Failed);
            (slot.take(), previous)
        };
        inner
            .attempts
            .store(inner.options.reconnect.max_attempts, Ordering::SeqCst);
        if let Some(session) = &session {
            session.cancel.cancel();
        }
        info!(previous = %previous, "live feed disconnect requested");
    }

    /// Disconnect and drop every registered handler.
    pub fn dispose(&self) {
        self.disconnect();
        self.inner.dispatcher.clear();
    }

    /// Publish `body` as JSON to `destination`.
    ///
    /// Fire-and-forget: returns `false` (and logs) if not connected or the
    /// body cannot be encoded.
    pub fn send<T: Serialize + ?Sized>(&self, destination: &str, body: &T) -> bool {
        if self.inner.state.load() != ConnectionState::Connected {
            warn!(destination, "not connected, message dropped");
            return false;
        }
        let body = match encode_record(body) {
            Ok(body) => body,
            Err(e) => {
                warn!(destination, error = %e, "cannot encode message");
                return false;
            }
        };
        let slot = self.inner.session.lock();
        let queued = slot.as_ref().is_some_and(|session| {
            session
                .outbound
                .send(Frame::send_json(destination, body))
                .is_ok()
        });
        if !queued {
            warn!(destination, "session closed, message dropped");
        }
        queued
    }

    /// Register `handler` for `kind`.
    pub fn on(&self, kind: EventKind, handler: Handler) {
        self.inner.dispatcher.on(kind, handler);
    }

    /// Remove one registration of `handler` for `kind`.
    pub fn off(&self, kind: EventKind, handler: &Handler) -> bool {
        self.inner.dispatcher.off(kind, handler)
    }

    /// Dispatcher events are emitted through.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    /// Whether the feed is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Indicator for the current state.
    #[must_use]
    pub fn indicator(&self) -> LinkIndicator {
        self.state().indicator()
    }

    /// Consecutive drops since the last successful handshake.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Options the client was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }
}

impl<C: Connector> fmt::Debug for LiveClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveClient")
            .field("state", &self.state())
            .field("attempts", &self.reconnect_attempts())
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}

struct Inner<C: Connector> {
    connector: C,
    options: ClientOptions,
    dispatcher: EventDispatcher,
    router: TopicRouter,
    state: AtomicConnectionState,
    attempts: AtomicU32,
    session: Mutex<Option<SessionSlot>>,
    next_session: AtomicU64,
}

struct SessionSlot {
    id: u64,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<Frame>,
}

struct Established<T> {
    transport: T,
    heartbeat: NegotiatedHeartbeat,
}

enum SessionEnd {
    Cancelled,
    /// Link lost. `error` marks transport failures as opposed to a close.
    Dropped { reason: String, error: bool },
}

impl<C: Connector> Inner<C> {
    /// Store `state` if session `id` still owns the connection. Slot swaps
    /// happen under the same lock.
    fn store_if_current(&self, id: u64, state: ConnectionState) -> bool {
        let slot = self.session.lock();
        let current = slot.as_ref().is_some_and(|session| session.id == id);
        if current {
            self.state.store(state);
        }
        current
    }

    fn owns(&self, id: u64) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.id == id)
    }

    /// Whether a newer session has taken over from `id`.
    fn superseded(&self, id: u64) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.id != id)
    }

    fn on_connected(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        info!("live feed connected");
        self.dispatcher.emit(&LiveEvent::Connected);
    }

    fn release(&self, id: u64) {
        let mut slot = self.session.lock();
        if slot.as_ref().is_some_and(|session| session.id == id) {
            *slot = None;
        }
    }

    async fn handshake(&self, credential: &str) -> Result<Established<C::Transport>, LiveError> {
        let limit = self.options.connect_timeout;
        timeout(limit, self.open_session(credential))
            .await
            .map_err(|_| LiveError::Timeout(limit))?
    }

    async fn open_session(&self, credential: &str) -> Result<Established<C::Transport>, LiveError> {
        let mut transport = self.connector.open(credential).await?;
        match self.negotiate(&mut transport).await {
            Ok(heartbeat) => Ok(Established {
                transport,
                heartbeat,
            }),
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    async fn negotiate(&self, transport: &mut C::Transport) -> Result<NegotiatedHeartbeat, LiveError> {
        let host = self.connector.host();
        transport
            .send(&Frame::connect(&host, self.options.heartbeat.advertisement()))
            .await?;

        let reply = loop {
            match transport.recv().await {
                Some(Ok(Inbound::Frame(frame))) => break frame,
                Some(Ok(Inbound::HeartBeat)) => {}
                Some(Ok(Inbound::Malformed(e))) => {
                    return Err(LiveError::Handshake(format!("malformed reply: {e}")));
                }
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(LiveError::Handshake(
                        "connection closed during handshake".to_string(),
                    ));
                }
            }
        };

        match reply.command {
            Command::Connected => {}
            Command::Error => return Err(LiveError::Handshake(error_text(&reply))),
            other => {
                return Err(LiveError::Handshake(format!(
                    "expected CONNECTED, got {other}"
                )));
            }
        }

        let heartbeat = self.options.heartbeat.negotiate(reply.header("heart-beat"));
        for frame in self.router.subscribe_frames() {
            transport.send(&frame).await?;
        }
        debug!(
            topics = self.router.routes().len(),
            send_every = ?heartbeat.send_every,
            expect_every = ?heartbeat.expect_every,
            "subscribed to dashboard topics"
        );
        Ok(heartbeat)
    }

    async fn supervise(
        self: Arc<Self>,
        id: u64,
        mut established: Established<C::Transport>,
        credential: String,
        mut outbound: mpsc::UnboundedReceiver<Frame>,
        cancel: CancellationToken,
    ) {
        loop {
            match self.run_session(&mut established, &mut outbound, &cancel).await {
                SessionEnd::Cancelled => {
                    if let Err(e) = established.transport.send(&Frame::disconnect()).await {
                        debug!(error = %e, "DISCONNECT not delivered");
                    }
                    established.transport.close().await;
                    info!(session = id, "live feed closed by client");
                    if !self.superseded(id) {
                        self.dispatcher.emit(&LiveEvent::Disconnected {
                            reason: "closed by client".to_string(),
                        });
                    }
                    return;
                }
                SessionEnd::Dropped { reason, error } => {
                    established.transport.close().await;
                    warn!(session = id, reason = %reason, "live feed dropped");
                    let current = self.store_if_current(id, ConnectionState::Disconnected);
                    if !current && self.superseded(id) {
                        debug!(session = id, "stale session ended");
                        return;
                    }
                    if error {
                        self.dispatcher.emit(&LiveEvent::Error {
                            source: ErrorSource::Transport,
                            message: reason.clone(),
                        });
                    }
                    self.dispatcher.emit(&LiveEvent::Disconnected {
                        reason: reason.clone(),
                    });
                    if !current {
                        return;
                    }

                    let Some(next) = self.retry(id, &credential, &cancel, reason).await else {
                        self.release(id);
                        return;
                    };
                    let stale = std::iter::from_fn(|| outbound.try_recv().ok()).count();
                    if stale > 0 {
                        debug!(dropped = stale, "discarding frames queued before the drop");
                    }
                    established = next;
                    if !self.store_if_current(id, ConnectionState::Connected) {
                        established.transport.close().await;
                        return;
                    }
                    self.on_connected();
                }
            }
        }
    }

    async fn retry(
        &self,
        id: u64,
        credential: &str,
        cancel: &CancellationToken,
        mut last_error: String,
    ) -> Option<Established<C::Transport>> {
        loop {
            if !self.owns(id) {
                return None;
            }
            let (attempt, delay) = match self.options.reconnect.on_drop(&self.attempts) {
                RetryDecision::Retry { attempt, delay } => (attempt, delay),
                RetryDecision::GiveUp { attempts } => {
                    if !self.store_if_current(id, ConnectionState::Failed) {
                        return None;
                    }
                    warn!(attempts, last_error = %last_error, "giving up on live feed");
                    self.dispatcher.emit(&LiveEvent::Failed {
                        attempts,
                        last_error,
                    });
                    return None;
                }
            };

            if !self.store_if_current(id, ConnectionState::Reconnecting) {
                return None;
            }
            warn!(
                attempt,
                max_attempts = self.options.reconnect.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling reconnect"
            );
            self.dispatcher
                .emit(&LiveEvent::Reconnecting { attempt, delay });

            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = sleep(delay) => {}
            }

            if !self.store_if_current(id, ConnectionState::Connecting) {
                return None;
            }
            info!(attempt, "reconnecting to live feed");
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                result = self.handshake(credential) => result,
            };

            match result {
                Ok(established) => return Some(established),
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect failed");
                    if !self.store_if_current(id, ConnectionState::Disconnected) {
                        return None;
                    }
                    last_error = e.to_string();
                    self.dispatcher.emit(&LiveEvent::Error {
                        source: ErrorSource::Handshake,
                        message: last_error.clone(),
                    });
                }
            }
        }
    }

    async fn run_session(
        &self,
        established: &mut Established<C::Transport>,
        outbound: &mut mpsc::UnboundedReceiver<Frame>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut monitor = HeartbeatMonitor::new(&established.heartbeat);
        let mut ticker = established.heartbeat.send_every.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                item = established.transport.recv() => match item {
                    Some(Ok(inbound)) => {
                        monitor.record_activity();
                        self.handle_inbound(inbound);
                    }
                    Some(Err(e)) => {
                        return SessionEnd::Dropped {
                            reason: e.to_string(),
                            error: true,
                        };
                    }
                    None => {
                        return SessionEnd::Dropped {
                            reason: "connection closed by server".to_string(),
                            error: false,
                        };
                    }
                },
                Some(frame) = outbound.recv() => {
                    trace!(destination = frame.header("destination").unwrap_or_default(), "publishing");
                    if let Err(e) = established.transport.send(&frame).await {
                        return SessionEnd::Dropped {
                            reason: format!("send failed: {e}"),
                            error: true,
                        };
                    }
                }
                () = next_tick(ticker.as_mut()) => {
                    if let Err(e) = established.transport.send_heartbeat().await {
                        return SessionEnd::Dropped {
                            reason: format!("heart-beat send failed: {e}"),
                            error: true,
                        };
                    }
                }
                () = expire(monitor.deadline()) => {
                    return SessionEnd::Dropped {
                        reason: "heart-beat timeout".to_string(),
                        error: false,
                    };
                }
            }
        }
    }

    fn handle_inbound(&self, inbound: Inbound) {
        match inbound {
            Inbound::HeartBeat => trace!("heart-beat received"),
            Inbound::Frame(frame) => self.handle_frame(&frame),
            Inbound::Malformed(e) => {
                warn!(error = %e, "malformed frame");
                self.dispatcher.emit(&LiveEvent::Error {
                    source: ErrorSource::Transport,
                    message: format!("malformed frame: {e}"),
                });
            }
        }
    }

    fn handle_frame(&self, frame: &Frame) {
        let destination = frame.header("destination").unwrap_or_default();
        match frame.command {
            Command::Message => match self.router.decode(frame) {
                Some(Ok(event)) => {
                    trace!(destination, event = %event.kind(), "frame routed");
                    self.dispatcher.emit(&event);
                }
                Some(Err(e)) => warn!(destination, error = %e, "dropping undecodable frame"),
                None => debug!(destination, "frame for unknown subscription"),
            },
            Command::Error => {
                let message = error_text(frame);
                warn!(message = %message, "server sent ERROR frame");
                self.dispatcher.emit(&LiveEvent::Error {
                    source: ErrorSource::Server,
                    message,
                });
            }
            Command::Receipt => trace!(receipt = frame.header("receipt-id").unwrap_or_default(), "receipt"),
            other => debug!(command = %other, "ignoring unexpected frame"),
        }
    }
}

fn error_text(frame: &Frame) -> String {
    match (frame.header("message"), frame.body.trim()) {
        (Some(message), "") => message.to_string(),
        (Some(message), body) => format!("{message}: {body}"),
        (None, "") => "server error".to_string(),
        (None, body) => body.to_string(),
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use crate::dispatcher::handler;

    /// Scripted transport: replies to CONNECT with `reply`, then yields
    /// `inbound`. With `fail` set it then errors, otherwise it stays open.
    struct ScriptedTransport {
        sent: Arc<Mutex<Vec<Frame>>>,
        inbound: VecDeque<Inbound>,
        fail: Option<String>,
        close_delay: Duration,
    }

    impl Transport for ScriptedTransport {
        async fn send(&mut self, frame: &Frame) -> Result<(), LiveError> {
            self.sent.lock().push(frame.clone());
            Ok(())
        }

        async fn send_heartbeat(&mut self) -> Result<(), LiveError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<Inbound, LiveError>> {
            if let Some(item) = self.inbound.pop_front() {
                return Some(Ok(item));
            }
            match self.fail.take() {
                Some(reason) => Some(Err(LiveError::Transport(reason))),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            tokio::time::sleep(self.close_delay).await;
        }
    }

    struct ScriptedConnector {
        sent: Arc<Mutex<Vec<Frame>>>,
        reply: Frame,
        then: Vec<Frame>,
        /// Per opened session: transport error after the script, and how
        /// long closing takes. Sessions past the end stay healthy.
        failures: Mutex<VecDeque<(String, Duration)>>,
    }

    impl ScriptedConnector {
        fn accepting(then: Vec<Frame>) -> Self {
            Self {
                sent: Arc::default(),
                reply: Frame::new(Command::Connected).with_header("heart-beat", "0,0"),
                then,
                failures: Mutex::default(),
            }
        }

        fn failing_once(reason: &str, close_delay: Duration) -> Self {
            let connector = Self::accepting(Vec::new());
            connector
                .failures
                .lock()
                .push_back((reason.to_string(), close_delay));
            connector
        }
    }

    impl Connector for ScriptedConnector {
        type Transport = ScriptedTransport;

        async fn open(&self, _credential: &str) -> Result<ScriptedTransport, LiveError> {
            let mut inbound: VecDeque<Inbound> = VecDeque::new();
            inbound.push_back(Inbound::Frame(self.reply.clone()));
            inbound.extend(self.then.iter().cloned().map(Inbound::Frame));
            let (fail, close_delay) = match self.failures.lock().pop_front() {
                Some((reason, delay)) => (Some(reason), delay),
                None => (None, Duration::ZERO),
            };
            Ok(ScriptedTransport {
                sent: Arc::clone(&self.sent),
                inbound,
                fail,
                close_delay,
            })
        }

        fn host(&self) -> String {
            "test".to_string()
        }
    }

    fn counter(client: &LiveClient<ScriptedConnector>, kind: EventKind) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        client.on(
            kind,
            handler(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        hits
    }

    #[tokio::test]
    async fn test_connect_subscribes_before_connected() {
        let connector = ScriptedConnector::accepting(Vec::new());
        let sent = Arc::clone(&connector.sent);
        let client = LiveClient::new(connector, ClientOptions::default());
        let connected = counter(&client, EventKind::Connected);

        client.connect("secret").await.expect("connect");

        assert!(client.is_connected());
        assert_eq!(client.indicator(), LinkIndicator::Live);
        assert_eq!(connected.load(Ordering::SeqCst), 1);

        let sent = sent.lock();
        assert_eq!(sent[0].command, Command::Connect);
        assert_eq!(sent[0].header("host"), Some("test"));
        let subscribed: Vec<_> = sent[1..]
            .iter()
            .filter(|f| f.command == Command::Subscribe)
            .filter_map(|f| f.header("destination"))
            .collect();
        assert_eq!(
            subscribed,
            [
                "/topic/dashboard/attacks",
                "/topic/dashboard/traffic",
                "/topic/dashboard/stats",
                "/topic/dashboard/status",
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let client = LiveClient::new(ScriptedConnector::accepting(Vec::new()), ClientOptions::default());
        let connected = counter(&client, EventKind::Connected);

        client.connect("a").await.expect("first connect");
        client.connect("a").await.expect("second connect");

        assert_eq!(connected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handshake_error_frame_fails_connect() {
        let connector = ScriptedConnector {
            reply: Frame::new(Command::Error).with_header("message", "Invalid token"),
            ..ScriptedConnector::accepting(Vec::new())
        };
        let client = LiveClient::new(connector, ClientOptions::default());
        let errors = counter(&client, EventKind::Error);

        let err = client.connect("bad").await.unwrap_err();

        assert_eq!(err.to_string(), "handshake failed: Invalid token");
        assert_eq!(client.state(), ConnectionState::Failed);
        assert_eq!(client.indicator(), LinkIndicator::Offline);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let client = LiveClient::new(ScriptedConnector::accepting(Vec::new()), ClientOptions::default());
        assert!(!client.send("/app/ping", &serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_send_publishes_json() {
        let connector = ScriptedConnector::accepting(Vec::new());
        let sent = Arc::clone(&connector.sent);
        let client = LiveClient::new(connector, ClientOptions::default());
        client.connect("a").await.expect("connect");

        assert!(client.send("/app/ack", &serde_json::json!({"id": "atk-1"})));

        for _ in 0..50 {
            if sent.lock().iter().any(|f| f.command == Command::Send) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = sent.lock();
        let frame = sent
            .iter()
            .find(|f| f.command == Command::Send)
            .expect("SEND frame");
        assert_eq!(frame.header("destination"), Some("/app/ack"));
        assert_eq!(frame.header("content-type"), Some("application/json"));
        assert_eq!(frame.body, r#"{"id":"atk-1"}"#);
    }

    #[tokio::test]
    async fn test_disconnect_pins_attempts() {
        let client = LiveClient::new(ScriptedConnector::accepting(Vec::new()), ClientOptions::default());
        client.connect("a").await.expect("connect");

        client.disconnect();

        assert_eq!(client.state(), ConnectionState::Failed);
        assert_eq!(client.reconnect_attempts(), 5);
        assert!(!client.send("/app/x", "late"));

        client.connect("a").await.expect("reconnect after disconnect");
        assert_eq!(client.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_server_error_frame_after_handshake_keeps_connection() {
        let error = Frame::new(Command::Error).with_header("message", "rate limited");
        let client = LiveClient::new(ScriptedConnector::accepting(vec![error]), ClientOptions::default());
        let messages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&messages);
        client.on(
            EventKind::Error,
            handler(move |event| {
                if let LiveEvent::Error { source, message } = event {
                    seen.lock().push((*source, message.clone()));
                }
                Ok(())
            }),
        );

        client.connect("a").await.expect("connect");
        for _ in 0..50 {
            if !messages.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            *messages.lock(),
            [(ErrorSource::Server, "rate limited".to_string())]
        );
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_transport_error_reported_before_disconnect() {
        let client = LiveClient::new(
            ScriptedConnector::failing_once("connection reset", Duration::ZERO),
            ClientOptions::default(),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let recorder = handler(move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });
        client.on(EventKind::Error, Arc::clone(&recorder));
        client.on(EventKind::Disconnected, recorder);

        client.connect("a").await.expect("connect");
        for _ in 0..50 {
            if seen.lock().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        client.disconnect();

        let seen = seen.lock();
        assert!(matches!(
            &seen[0],
            LiveEvent::Error { source: ErrorSource::Transport, message }
                if message == "transport error: connection reset"
        ));
        assert!(matches!(
            &seen[1],
            LiveEvent::Disconnected { reason } if reason == "transport error: connection reset"
        ));
    }

    #[tokio::test]
    async fn test_stale_teardown_leaves_new_session_alone() {
        let client = LiveClient::new(
            ScriptedConnector::failing_once("connection reset", Duration::from_millis(200)),
            ClientOptions::default(),
        );
        let store = crate::store::LiveStore::default();
        let _binding = store.bind(client.dispatcher());

        client.connect("a").await.expect("first connect");
        // The first session drops at once and is still closing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.disconnect();
        client.connect("a").await.expect("second connect");
        assert!(client.is_connected());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.indicator(), LinkIndicator::Live);
        assert_eq!(store.snapshot().link, LinkIndicator::Live);
        assert!(client.send("/app/ping", "still here"));
        assert_eq!(client.reconnect_attempts(), 0);

        client.disconnect();
    }

    #[test]
    fn test_error_text() {
        let frame = Frame::new(Command::Error)
            .with_header("message", "bad")
            .with_body("details\n");
        assert_eq!(error_text(&frame), "bad: details");
        assert_eq!(error_text(&Frame::new(Command::Error)), "server error");
    }

    #[test]
    fn test_options_from_config() {
        let options = ClientOptions::from(&LiveConfig::default());
        assert_eq!(options, ClientOptions::default());
    }
}
