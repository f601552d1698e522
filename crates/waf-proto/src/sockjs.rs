//! SockJS framing for the XHR polling fallback.
//!
//! Every poll response carries one frame per line: `o` (session open),
//! `h` (heartbeat), `a[...]` (JSON array of messages) or
//! `c[code,"reason"]` (session closed).

use crate::error::ProtoError;

/// A SockJS transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    /// Session opened.
    Open,
    /// Server heartbeat.
    Heartbeat,
    /// Messages delivered by the server.
    Messages(Vec<String>),
    /// Session closed by the server.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

impl SockJsFrame {
    /// Parse a single frame.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown frame type or malformed JSON payload.
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.as_bytes().first() {
            Some(b'o') => Ok(Self::Open),
            Some(b'h') => Ok(Self::Heartbeat),
            Some(b'a') => serde_json::from_str::<Vec<String>>(&line[1..])
                .map(Self::Messages)
                .map_err(|e| ProtoError::Decoding(format!("invalid sockjs array: {e}"))),
            Some(b'c') => {
                let (code, reason): (u16, String) = serde_json::from_str(&line[1..])
                    .map_err(|e| ProtoError::Decoding(format!("invalid sockjs close: {e}")))?;
                Ok(Self::Close { code, reason })
            }
            Some(other) => Err(ProtoError::Decoding(format!(
                "unknown sockjs frame type: {}",
                char::from(*other)
            ))),
            None => Err(ProtoError::Decoding("empty sockjs frame".to_string())),
        }
    }
}

/// Parse every frame of a poll response body.
///
/// # Errors
///
/// Returns an error if any non-empty line is not a valid frame.
pub fn parse_response(body: &str) -> Result<Vec<SockJsFrame>, ProtoError> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(SockJsFrame::parse)
        .collect()
}

/// Encode outbound messages as the `xhr_send` request body.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_send(messages: &[String]) -> Result<String, ProtoError> {
    serde_json::to_string(messages).map_err(|e| ProtoError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(SockJsFrame::parse("o\n").expect("open"), SockJsFrame::Open);
        assert_eq!(SockJsFrame::parse("h").expect("hb"), SockJsFrame::Heartbeat);
        assert_eq!(
            SockJsFrame::parse("c[3000,\"Go away!\"]").expect("close"),
            SockJsFrame::Close {
                code: 3000,
                reason: "Go away!".to_string()
            }
        );
    }

    #[test]
    fn test_parse_message_array_keeps_stomp_text() {
        let line = r#"a["MESSAGE\ndestination:/topic/x\n\n{}\u0000"]"#;
        match SockJsFrame::parse(line).expect("parse") {
            SockJsFrame::Messages(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].starts_with("MESSAGE\n"));
                assert!(messages[0].ends_with('\0'));
            }
            other => panic!("expected Messages, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_multiple_lines() {
        let frames = parse_response("o\nh\na[\"x\",\"y\"]\n").expect("parse");
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[2],
            SockJsFrame::Messages(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(SockJsFrame::parse("z").is_err());
        assert!(SockJsFrame::parse("").is_err());
        assert!(SockJsFrame::parse("a[1,2").is_err());
    }

    #[test]
    fn test_encode_send() {
        let body = encode_send(&["SEND\n\n\0".to_string()]).expect("encode");
        assert_eq!(body, r#"["SEND\n\n\u0000"]"#);
    }
}
