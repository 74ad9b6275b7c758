//! Direct-IP HTTPS fetcher
//!
//! Connects to an explicit IP address while presenting the logical hostname
//! in the URL, the `Host` header and the TLS server-name extension. The
//! client-level resolve override pins `hostname` to `ip` for this one request,
//! so certificate verification still runs against `hostname`.
//!
//! Exactly one request is sent per fetch. Redirects are not followed: a 3xx
//! is reported as-is, and its `Location` is never resolved through the
//! system resolver.

use crate::error::Result;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of a probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Issues a single GET against an already-resolved address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EndpointFetcher: Send + Sync {
    async fn fetch(&self, ip: Ipv4Addr, hostname: &str, path: &str) -> Result<FetchResponse>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct DirectIpFetcher {
    timeout: Duration,
    scheme: String,
    port: u16,
}

impl DirectIpFetcher {
    /// Create an HTTPS fetcher on port 443
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            scheme: "https".to_string(),
            port: 443,
        }
    }

    /// Use plain HTTP on the given port (local test servers)
    pub fn plain_http(timeout: Duration, port: u16) -> Self {
        Self {
            timeout,
            scheme: "http".to_string(),
            port,
        }
    }

    fn url(&self, hostname: &str, path: &str) -> String {
        let default_port = matches!(
            (self.scheme.as_str(), self.port),
            ("https", 443) | ("http", 80)
        );
        if default_port {
            format!("{}://{}{}", self.scheme, hostname, path)
        } else {
            format!("{}://{}:{}{}", self.scheme, hostname, self.port, path)
        }
    }
}

impl Default for DirectIpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[async_trait]
impl EndpointFetcher for DirectIpFetcher {
    #[tracing::instrument(
        name = "probe.fetch",
        skip(self),
        fields(
            net.peer.ip = %ip,
            http.host = %hostname,
            http.method = "GET",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn fetch(&self, ip: Ipv4Addr, hostname: &str, path: &str) -> Result<FetchResponse> {
        // A client per call: the resolve override is client-wide and the
        // address changes between attempts.
        let client = reqwest::Client::builder()
            .resolve(hostname, SocketAddr::new(IpAddr::V4(ip), self.port))
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let response = client.get(self.url(hostname, path)).send().await?;
        let status = response.status().as_u16();
        tracing::Span::current().record("http.status_code", status);

        // Readiness depends on the status alone
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(status = status, error = %e, "Response body unreadable");
                String::new()
            }
        };

        Ok(FetchResponse { status, body })
    }
}
