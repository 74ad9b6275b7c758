//! Readiness Probe Integration Tests
//!
//! Drives the direct-IP fetcher against a local mock server reached through a
//! hostname that only the stub resolver knows about.

use async_trait::async_trait;
use sandbox_uploadr::dns::HostResolver;
use sandbox_uploadr::error::{ClientError, ErrorKind, Result};
use sandbox_uploadr::probe::{DirectIpFetcher, EndpointFetcher, ProbeOutcome, ReadinessProber};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOSTNAME: &str = "abc123.sandbox.test";

/// Resolves every name to loopback, failing the first `failures` calls
struct LoopbackResolver {
    failures: u32,
    calls: AtomicU32,
}

impl LoopbackResolver {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HostResolver for LoopbackResolver {
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ClientError::Resolution {
                hostname: hostname.to_string(),
                message: "NXDOMAIN".into(),
            });
        }
        Ok(Ipv4Addr::LOCALHOST)
    }
}

#[tokio::test]
async fn test_fetcher_connects_by_ip_with_logical_host() {
    let server = MockServer::start().await;
    let port = server.address().port();

    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("host", format!("{HOSTNAME}:{port}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = DirectIpFetcher::plain_http(Duration::from_secs(5), port);
    let response = fetcher
        .fetch(Ipv4Addr::LOCALHOST, HOSTNAME, "/health")
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_fetcher_times_out() {
    let server = MockServer::start().await;
    let port = server.address().port();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = DirectIpFetcher::plain_http(Duration::from_millis(200), port);
    let err = fetcher
        .fetch(Ipv4Addr::LOCALHOST, HOSTNAME, "/")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_prober_waits_through_resolution_and_5xx() {
    let server = MockServer::start().await;
    let port = server.address().port();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let prober = ReadinessProber::new(
        LoopbackResolver::new(1),
        DirectIpFetcher::plain_http(Duration::from_secs(2), port),
        10,
        Duration::from_millis(10),
    )
    .unwrap();

    let outcome = prober.wait_until_ready(HOSTNAME, "/").await.unwrap();

    // 1 resolution failure, 2 x 503, then 404 counts as ready
    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.status, 404);
}

#[tokio::test]
async fn test_prober_exhausts_with_attempt_count() {
    let server = MockServer::start().await;
    let port = server.address().port();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let prober = ReadinessProber::new(
        LoopbackResolver::new(0),
        DirectIpFetcher::plain_http(Duration::from_secs(2), port),
        3,
        Duration::from_millis(10),
    )
    .unwrap();

    let err = prober.wait_until_ready(HOSTNAME, "/").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    match err {
        ClientError::ProbeExhausted { hostname, attempts } => {
            assert_eq!(hostname, HOSTNAME);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected ProbeExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redirect_is_ready_without_following() {
    let server = MockServer::start().await;
    let port = server.address().port();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "http://login.unresolvable.invalid/"),
        )
        .mount(&server)
        .await;

    let prober = ReadinessProber::new(
        LoopbackResolver::new(0),
        DirectIpFetcher::plain_http(Duration::from_secs(2), port),
        5,
        Duration::from_millis(10),
    )
    .unwrap();

    let outcome = prober.wait_until_ready(HOSTNAME, "/").await.unwrap();
    assert_eq!(outcome, ProbeOutcome { attempts: 1, status: 302 });

    // The Location target was never requested
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_truncated_body_keeps_ready_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // Promises 100 bytes, sends 5, then closes the connection
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
            .await
            .unwrap();
    });

    let fetcher = DirectIpFetcher::plain_http(Duration::from_secs(2), port);
    let response = fetcher.fetch(Ipv4Addr::LOCALHOST, HOSTNAME, "/").await.unwrap();

    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}
