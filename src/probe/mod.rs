//! Endpoint readiness probing
//!
//! Waits for a freshly provisioned execution endpoint to become reachable.
//! Each attempt resolves the hostname against the authoritative nameservers
//! and issues a direct-IP request carrying the hostname as Host/SNI.
//!
//! Any status in `[200, 500)` counts as ready: a 4xx still proves the unit is
//! up and routable. Resolution failures, transport failures and 5xx responses
//! are counted and retried after a fixed delay until the attempt ceiling.

pub mod fetch;

use crate::config::ProbeConfig;
use crate::dns::{AuthoritativeResolver, HostResolver};
use crate::error::{ClientError, Result};
use crate::metrics;
use std::time::Duration;

pub use fetch::{DirectIpFetcher, EndpointFetcher, FetchResponse};

/// Lowest status treated as ready
pub const READY_STATUS_MIN: u16 = 200;

/// First status treated as not ready
pub const READY_STATUS_MAX: u16 = 500;

/// Whether a probe response status means the endpoint is up
#[inline]
pub fn is_ready_status(status: u16) -> bool {
    (READY_STATUS_MIN..READY_STATUS_MAX).contains(&status)
}

/// Probe lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Probing,
    Ready,
    Exhausted,
}

/// Ephemeral state of one readiness wait
#[derive(Debug, Clone)]
pub struct EndpointProbeState {
    pub attempt_count: u32,
    pub hostname: String,
    pub path: String,
    pub phase: ProbePhase,
}

impl EndpointProbeState {
    fn new(hostname: &str, path: &str) -> Self {
        Self {
            attempt_count: 0,
            hostname: hostname.to_string(),
            path: path.to_string(),
            phase: ProbePhase::Probing,
        }
    }
}

/// Successful probe result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub attempts: u32,
    pub status: u16,
}

/// Drives a resolver and fetcher until the endpoint answers
pub struct ReadinessProber<R, F> {
    resolver: R,
    fetcher: F,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ReadinessProber<AuthoritativeResolver, DirectIpFetcher> {
    /// Build the production prober from configuration
    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        let resolver = AuthoritativeResolver::new(config.nameservers.clone())?;
        let fetcher = DirectIpFetcher::new(config.request_timeout());
        Self::new(resolver, fetcher, config.max_attempts, config.retry_delay())
    }
}

impl<R, F> ReadinessProber<R, F>
where
    R: HostResolver,
    F: EndpointFetcher,
{
    pub fn new(resolver: R, fetcher: F, max_attempts: u32, retry_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ClientError::Validation(
                "readiness probe needs at least one attempt".into(),
            ));
        }

        Ok(Self {
            resolver,
            fetcher,
            max_attempts,
            retry_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait until `hostname` answers on `path` with a ready status
    #[tracing::instrument(
        name = "probe.wait_until_ready",
        skip(self),
        fields(
            probe.hostname = %hostname,
            probe.path = %path,
            probe.max_attempts = self.max_attempts,
            probe.attempts = tracing::field::Empty
        ),
        err
    )]
    pub async fn wait_until_ready(&self, hostname: &str, path: &str) -> Result<ProbeOutcome> {
        let mut state = EndpointProbeState::new(hostname, path);

        while state.phase == ProbePhase::Probing {
            state.attempt_count += 1;
            metrics::record_probe_attempt();

            if let Some(status) = self.attempt(&state).await {
                state.phase = ProbePhase::Ready;
                tracing::Span::current().record("probe.attempts", state.attempt_count);
                metrics::record_probe_outcome(true);

                tracing::info!(
                    hostname = %state.hostname,
                    attempts = state.attempt_count,
                    status = status,
                    "Endpoint ready"
                );

                return Ok(ProbeOutcome {
                    attempts: state.attempt_count,
                    status,
                });
            }

            if state.attempt_count >= self.max_attempts {
                state.phase = ProbePhase::Exhausted;
            } else {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::Span::current().record("probe.attempts", state.attempt_count);
        metrics::record_probe_outcome(false);

        Err(ClientError::ProbeExhausted {
            hostname: state.hostname,
            attempts: state.attempt_count,
        })
    }

    /// One resolve + fetch round; `Some(status)` when ready
    async fn attempt(&self, state: &EndpointProbeState) -> Option<u16> {
        let ip = match self.resolver.resolve_ipv4(&state.hostname).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::debug!(attempt = state.attempt_count, error = %e, "Resolution not ready");
                return None;
            }
        };

        match self.fetcher.fetch(ip, &state.hostname, &state.path).await {
            Ok(response) if is_ready_status(response.status) => Some(response.status),
            Ok(response) => {
                tracing::debug!(
                    attempt = state.attempt_count,
                    ip = %ip,
                    status = response.status,
                    "Endpoint not ready"
                );
                None
            }
            Err(e) => {
                tracing::debug!(attempt = state.attempt_count, ip = %ip, error = %e, "Fetch failed");
                None
            }
        }
    }
}
