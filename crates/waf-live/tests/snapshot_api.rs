//! Integration tests for the REST snapshot client against a minimal
//! in-process HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use waf_live::{DashboardApi, LiveError, LiveStore};
use waf_proto::WafState;

// ============================================================================
// Mock REST API
// ============================================================================

#[derive(Debug, Clone)]
struct Seen {
    target: String,
    authorization: Option<String>,
}

struct MockApi {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockApi {
    /// Serve `respond(path)` until the test ends.
    async fn start(respond: fn(&str) -> (u16, String)) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    let target = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or_default()
                        .to_string();
                    let authorization = head.lines().find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("authorization")
                            .then(|| value.trim().to_string())
                    });
                    log.lock().push(Seen {
                        target: target.clone(),
                        authorization,
                    });

                    let path = target.split('?').next().unwrap_or_default();
                    let (status, body) = respond(path);
                    let response = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, seen }
    }

    fn base(&self) -> Url {
        Url::parse(&format!("http://{}/api", self.addr)).expect("base url")
    }

    fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.seen.lock().iter().map(|s| s.target.clone()).collect();
        targets.sort();
        targets
    }
}

fn dashboard(path: &str) -> (u16, String) {
    let data = match path {
        "/api/dashboard/status" => {
            r#"{"status":"active","version":"3.1.0","lastRestart":"2024-05-01T00:00:00Z",
            "configLastUpdated":"2024-05-01T08:00:00Z","rulesCount":240,"activeRulesCount":230}"#
        }
        "/api/dashboard/stats" => {
            r#"{"totalRequests":5000,"blockedRequests":120,"allowedRequests":4880,
            "blockRate":2.4,"avgResponseTime":21.0,"uptime":86400.0}"#
        }
        "/api/dashboard/attacks" => {
            r#"[{"id":"atk-2","timestamp":"t2","sourceIp":"198.51.100.1","targetPath":"/a",
            "attackType":"xss","severity":"medium","blocked":true},
            {"id":"atk-1","timestamp":"t1","sourceIp":"198.51.100.2","targetPath":"/b",
            "attackType":"sqli","severity":"high","blocked":true}]"#
        }
        "/api/dashboard/traffic" => {
            r#"[{"timestamp":"10:00","totalRequests":10,"blockedRequests":1,"allowedRequests":9,"responseTime":20.0},
            {"timestamp":"10:01","totalRequests":12,"blockedRequests":0,"allowedRequests":12,"responseTime":19.0}]"#
        }
        _ => return (404, r#"{"success":false,"error":"not found"}"#.to_string()),
    };
    (200, format!(r#"{{"success":true,"data":{data}}}"#))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_seed_fills_store() {
    let server = MockApi::start(dashboard).await;
    let api = DashboardApi::new(server.base(), "secret");
    let store = LiveStore::default();

    api.seed(&store, 24).await.expect("seed");

    let view = store.snapshot();
    assert_eq!(view.status.current().map(|s| s.status), Some(WafState::Active));
    assert_eq!(view.stats.current().map(|s| s.total_requests), Some(5000));
    let ids: Vec<&str> = view.attacks.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["atk-2", "atk-1"]);
    assert_eq!(view.traffic.latest().map(|s| s.total_requests), Some(12));

    assert_eq!(
        server.targets(),
        [
            "/api/dashboard/attacks?limit=50",
            "/api/dashboard/stats",
            "/api/dashboard/status",
            "/api/dashboard/traffic?hours=24",
        ]
    );
    assert!(
        server
            .seen
            .lock()
            .iter()
            .all(|s| s.authorization.as_deref() == Some("Bearer secret"))
    );
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_error() {
    fn refuse(_: &str) -> (u16, String) {
        (200, r#"{"success":false,"error":"token expired"}"#.to_string())
    }
    let server = MockApi::start(refuse).await;
    let api = DashboardApi::new(server.base(), "stale");

    let err = api.stats().await.unwrap_err();
    assert!(matches!(err, LiveError::Protocol(_)));
    assert!(err.to_string().contains("token expired"));
}

#[tokio::test]
async fn test_http_error_status_propagates_and_store_untouched() {
    fn broken(path: &str) -> (u16, String) {
        if path.ends_with("/traffic") {
            (500, "{}".to_string())
        } else {
            dashboard(path)
        }
    }
    let server = MockApi::start(broken).await;
    let api = DashboardApi::new(server.base(), "t");
    let store = LiveStore::default();

    let err = api.seed(&store, 1).await.unwrap_err();

    assert!(matches!(err, LiveError::Http(_)));
    let view = store.snapshot();
    assert!(view.attacks.is_empty());
    assert!(view.stats.current().is_none());
}
