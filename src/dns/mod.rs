//! Authoritative DNS resolution
//!
//! Resolves hostnames by asking a fixed set of authoritative nameservers
//! directly. Freshly provisioned sandbox subdomains are visible on the
//! authoritative servers long before recursive resolvers (and the system
//! cache) pick them up, so the system resolver is never consulted here.
//!
//! Every call builds a fresh resolver with caching disabled; a negative answer
//! from an earlier attempt must not shadow a record that has since appeared.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Standard DNS port
pub const DNS_PORT: u16 = 53;

/// Resolves a hostname to a single IPv4 address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr>;
}

/// Resolver that queries authoritative nameservers only
#[derive(Debug, Clone)]
pub struct AuthoritativeResolver {
    nameservers: Vec<IpAddr>,
    port: u16,
    query_timeout: Duration,
}

impl AuthoritativeResolver {
    /// Create a resolver for the given nameserver addresses
    pub fn new(nameservers: Vec<IpAddr>) -> Result<Self> {
        if nameservers.is_empty() {
            return Err(ClientError::Validation(
                "at least one authoritative nameserver is required".into(),
            ));
        }

        Ok(Self {
            nameservers,
            port: DNS_PORT,
            query_timeout: Duration::from_secs(2),
        })
    }

    /// Override the nameserver port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the per-query timeout
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn nameservers(&self) -> &[IpAddr] {
        &self.nameservers
    }

    fn build(&self) -> TokioAsyncResolver {
        let group = NameServerConfigGroup::from_ips_clear(&self.nameservers, self.port, true);
        let config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.use_hosts_file = false;
        opts.timeout = self.query_timeout;
        opts.attempts = 1;

        TokioAsyncResolver::tokio(config, opts)
    }
}

#[async_trait]
impl HostResolver for AuthoritativeResolver {
    #[tracing::instrument(
        name = "dns.resolve_authoritative",
        skip(self),
        fields(
            dns.hostname = %hostname,
            dns.nameservers = self.nameservers.len(),
            dns.address = tracing::field::Empty
        ),
        err
    )]
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr> {
        let resolver = self.build();

        let lookup = resolver
            .ipv4_lookup(hostname)
            .await
            .map_err(|e| ClientError::Resolution {
                hostname: hostname.to_string(),
                message: e.to_string(),
            })?;

        let address = lookup
            .iter()
            .next()
            .map(|record| record.0)
            .ok_or_else(|| ClientError::Resolution {
                hostname: hostname.to_string(),
                message: "no A records returned".into(),
            })?;

        tracing::Span::current().record("dns.address", tracing::field::display(address));
        tracing::debug!(hostname = %hostname, address = %address, "Resolved via authoritative nameserver");

        Ok(address)
    }
}
