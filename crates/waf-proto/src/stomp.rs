//! STOMP 1.2 frame codec.
//!
//! A frame is `COMMAND EOL *(header EOL) EOL body NUL`. Bare EOLs between
//! frames are heart-beats. Header values are escaped on every frame except
//! `CONNECT` and `CONNECTED`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProtoError;

/// STOMP frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (1.2 alias of `CONNECT`).
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Publish to a destination.
    Send,
    /// Subscribe to a destination.
    Subscribe,
    /// Cancel a subscription.
    Unsubscribe,
    /// Acknowledge a message.
    Ack,
    /// Negative acknowledgement.
    Nack,
    /// Begin a transaction.
    Begin,
    /// Commit a transaction.
    Commit,
    /// Abort a transaction.
    Abort,
    /// Graceful client shutdown.
    Disconnect,
    /// Message delivered on a subscription.
    Message,
    /// Receipt for a client frame.
    Receipt,
    /// Server-side error.
    Error,
}

impl Command {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Handshake frames carry raw, unescaped header values.
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl FromStr for Command {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(ProtoError::InvalidCommand(other.to_string())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heart-beat intervals advertised in the `heart-beat` header, in
/// milliseconds. Zero means "cannot send" / "does not want to receive".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which the sender can emit heart-beats.
    pub outgoing_ms: u64,
    /// Desired interval between heart-beats from the peer.
    pub incoming_ms: u64,
}

impl HeartBeat {
    /// Create a heart-beat advertisement.
    #[must_use]
    pub const fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parse a `cx,cy` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not two comma separated integers.
    pub fn parse(value: &str) -> Result<Self, ProtoError> {
        let (out, inc) = value
            .split_once(',')
            .ok_or_else(|| ProtoError::Decoding(format!("invalid heart-beat header: {value}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| ProtoError::Decoding(format!("invalid heart-beat header: {e}")))
        };
        Ok(Self::new(parse(out)?, parse(inc)?))
    }

    /// Header value representation.
    #[must_use]
    pub fn to_header(&self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Negotiate against the server's advertisement.
    ///
    /// Returns `(send_every, expect_every)` from the client's point of view;
    /// `None` disables that direction.
    #[must_use]
    pub fn negotiate(&self, server: &Self) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: u64, theirs: u64| {
            (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
        };
        (
            pick(self.outgoing_ms, server.incoming_ms),
            pick(self.incoming_ms, server.outgoing_ms),
        )
    }
}

/// A STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    headers: Vec<(String, String)>,
    /// Frame body (text).
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header. When repeated, the first occurrence wins.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All headers in wire order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build the client `CONNECT` frame.
    #[must_use]
    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", host)
            .with_header("heart-beat", heart_beat.to_header())
    }

    /// Build a `SUBSCRIBE` frame.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// Build an `UNSUBSCRIBE` frame.
    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// Build a `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    /// Build a `DISCONNECT` frame.
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Encode to wire text, including the trailing NUL.
    #[must_use]
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                push_escaped(&mut out, name);
                out.push(':');
                push_escaped(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// One item read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A run of bare EOLs.
    HeartBeat,
    /// A complete frame.
    Frame(Frame),
}

/// Parse every frame and heart-beat contained in `input`.
///
/// # Errors
///
/// Returns an error on an unknown command, a malformed header, a bad
/// escape sequence, or a frame that is not NUL terminated.
pub fn parse_frames(input: &str) -> Result<Vec<StompItem>, ProtoError> {
    let bytes = input.as_bytes();
    let mut items = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        while pos < bytes.len() && matches!(bytes[pos], b'\n' | b'\r') {
            pos += 1;
        }
        if pos > start {
            items.push(StompItem::HeartBeat);
        }
        if pos >= bytes.len() {
            break;
        }

        let (line, next) = read_line(input, pos)?;
        let command: Command = line.parse()?;
        pos = next;

        let mut headers = Vec::new();
        loop {
            let (line, next) = read_line(input, pos)?;
            pos = next;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtoError::Decoding(format!("malformed header line: {line}")))?;
            if command.escapes_headers() {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|e| ProtoError::Decoding(format!("invalid content-length: {e}")))
            })
            .transpose()?;

        let end = match content_length {
            Some(len) => {
                let end = pos + len;
                if bytes.get(end) != Some(&0) {
                    return Err(ProtoError::Decoding(
                        "content-length does not end at a NUL".to_string(),
                    ));
                }
                end
            }
            None => bytes[pos..]
                .iter()
                .position(|b| *b == 0)
                .map(|offset| pos + offset)
                .ok_or_else(|| ProtoError::Decoding("frame is not NUL terminated".to_string()))?,
        };

        let body = input
            .get(pos..end)
            .ok_or_else(|| ProtoError::Decoding("body is not valid UTF-8".to_string()))?;

        items.push(StompItem::Frame(Frame {
            command,
            headers,
            body: body.to_string(),
        }));
        pos = end + 1;
    }

    Ok(items)
}

fn read_line(input: &str, pos: usize) -> Result<(&str, usize), ProtoError> {
    let rest = &input[pos..];
    let len = rest
        .find('\n')
        .ok_or_else(|| ProtoError::Decoding("unterminated frame line".to_string()))?;
    let line = rest[..len].strip_suffix('\r').unwrap_or(&rest[..len]);
    Ok((line, pos + len + 1))
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(value: &str) -> Result<String, ProtoError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(ProtoError::Decoding(format!("invalid escape sequence: \\{other}")));
            }
            None => return Err(ProtoError::Decoding("dangling escape".to_string())),
        }
    }
    Ok(out)
}
