//! DNS resolution for mail domains using hickory-resolver
//!
//! Resolves MX records first and falls back to an A/AAAA race under a shared
//! timeout budget. Never propagates a resolver failure past this boundary:
//! every outcome is folded into a `DnsResult` with a reason, a base score and
//! a confidence multiplier the orchestrator applies later.

use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    AsyncResolver, TokioAsyncResolver,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Shared budget for the A/AAAA race once the MX lookup came back empty.
const ADDRESS_RACE_TIMEOUT_MS: u64 = 1500;

/// A mail exchanger, ordered ascending by priority before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxHost {
    pub exchange: String,
    pub priority: u16,
}

/// Why the resolver reached its conclusion about a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsReason {
    MxFound,
    AFallback,
    NoMxNoA,
    /// An MX exchange is literally `"."`: the domain refuses mail
    NullMx,
    Timeout,
    DnsError,
}

impl DnsReason {
    /// Rejecting on infrastructure slowness is unsafe, so a timeout stays
    /// valid at reduced confidence.
    pub fn is_valid(self) -> bool {
        matches!(self, Self::MxFound | Self::AFallback | Self::Timeout)
    }

    pub fn base_score(self) -> u8 {
        match self {
            Self::MxFound => 100,
            Self::AFallback => 80,
            Self::Timeout => 50,
            Self::NoMxNoA => 30,
            Self::DnsError => 30,
            Self::NullMx => 10,
        }
    }

    /// Multiplier the orchestrator applies to the final score.
    pub fn confidence_multiplier(self) -> f64 {
        match self {
            Self::AFallback => 0.92,
            Self::Timeout => 0.85,
            _ => 1.0,
        }
    }
}

/// Outcome of resolving a domain's mail infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsResult {
    pub reason: DnsReason,
    pub mx_records: Vec<MxHost>,
    pub has_a: bool,
    pub has_aaaa: bool,
    pub dns_timed_out: bool,
    pub score: u8,
}

impl DnsResult {
    fn from_reason(reason: DnsReason) -> Self {
        Self {
            reason,
            mx_records: Vec::new(),
            has_a: false,
            has_aaaa: false,
            dns_timed_out: reason == DnsReason::Timeout,
            score: reason.base_score(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.reason.is_valid()
    }
}

/// Lookup failure at the client boundary. "No records" is not an error; the
/// client maps it to an empty/false success.
#[derive(Debug, Error)]
pub enum DnsLookupError {
    #[error("DNS lookup timed out")]
    Timeout,
    #[error("DNS lookup failed: {0}")]
    Failure(String),
}

impl From<ResolveError> for DnsLookupError {
    fn from(error: ResolveError) -> Self {
        match error.kind() {
            ResolveErrorKind::Timeout => Self::Timeout,
            _ => Self::Failure(error.to_string()),
        }
    }
}

/// Seam between the resolver decision table and the actual DNS transport,
/// mockable in tests.
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxHost>, DnsLookupError>;
    async fn resolve_a(&self, domain: &str) -> Result<bool, DnsLookupError>;
    async fn resolve_aaaa(&self, domain: &str) -> Result<bool, DnsLookupError>;
}

/// Production client over hickory's Tokio resolver with Cloudflare upstreams.
pub struct HickoryDnsClient {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsClient {
    /// Create a resolver tuned for short-lived validation lookups.
    ///
    /// # Arguments
    /// * `timeout_ms` - per-query timeout in milliseconds
    pub fn new(timeout_ms: u64) -> Self {
        info!("Initializing DNS resolver with Cloudflare DNS");

        let config = ResolverConfig::cloudflare();

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_millis(timeout_ms);
        opts.attempts = 2;
        opts.cache_size = 1024;
        opts.positive_min_ttl = Some(Duration::from_secs(60));
        opts.negative_min_ttl = Some(Duration::from_secs(30));
        opts.positive_max_ttl = Some(Duration::from_secs(3600));

        let resolver = AsyncResolver::tokio(config, opts);

        Self { resolver }
    }
}

impl Default for HickoryDnsClient {
    fn default() -> Self {
        Self::new(ADDRESS_RACE_TIMEOUT_MS)
    }
}

#[async_trait]
impl DnsClient for HickoryDnsClient {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxHost>, DnsLookupError> {
        debug!("Looking up MX records for domain: {}", domain);

        match self.resolver.mx_lookup(domain).await {
            Ok(response) => {
                let hosts: Vec<MxHost> = response
                    .iter()
                    .map(|mx| MxHost {
                        exchange: normalize_exchange(&mx.exchange().to_string()),
                        priority: mx.preference(),
                    })
                    .collect();
                debug!("Domain {} has {} MX record(s)", domain, hosts.len());
                Ok(hosts)
            }
            Err(error) => match error.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    debug!("Domain {} has no MX records", domain);
                    Ok(Vec::new())
                }
                _ => Err(error.into()),
            },
        }
    }

    async fn resolve_a(&self, domain: &str) -> Result<bool, DnsLookupError> {
        match self.resolver.ipv4_lookup(domain).await {
            Ok(response) => Ok(response.iter().count() > 0),
            Err(error) => match error.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                _ => Err(error.into()),
            },
        }
    }

    async fn resolve_aaaa(&self, domain: &str) -> Result<bool, DnsLookupError> {
        match self.resolver.ipv6_lookup(domain).await {
            Ok(response) => Ok(response.iter().count() > 0),
            Err(error) => match error.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                _ => Err(error.into()),
            },
        }
    }
}

/// DNS names come back with a trailing root dot; strip it except for the
/// null-MX marker which is exactly `"."`.
fn normalize_exchange(exchange: &str) -> String {
    if exchange == "." {
        return exchange.to_string();
    }
    exchange.trim_end_matches('.').to_lowercase()
}

/// Decides the mail-infrastructure verdict for a domain.
pub struct DomainResolver {
    client: std::sync::Arc<dyn DnsClient>,
}

impl DomainResolver {
    pub fn new(client: std::sync::Arc<dyn DnsClient>) -> Self {
        Self { client }
    }

    /// Resolve a domain into a `DnsResult`. Never fails: resolver errors and
    /// timeouts produce their own reasons.
    pub async fn resolve(&self, domain: &str) -> DnsResult {
        match self.client.resolve_mx(domain).await {
            Ok(mut records) if !records.is_empty() => {
                if records.iter().any(|host| host.exchange == ".") {
                    debug!("Domain {} publishes a null MX", domain);
                    return DnsResult::from_reason(DnsReason::NullMx);
                }

                // The probe consumes this list in order, so the ascending
                // priority invariant is enforced here, not per client impl
                records.sort_by_key(|host| host.priority);

                let mut result = DnsResult::from_reason(DnsReason::MxFound);
                result.mx_records = records;
                result
            }
            Ok(_) => self.address_fallback(domain).await,
            Err(DnsLookupError::Timeout) => {
                // A stalled MX lookup still gets the address race; only the
                // race's own deadline concludes Timeout
                warn!("MX lookup timed out for domain: {}", domain);
                self.address_fallback(domain).await
            }
            Err(error) => {
                debug!("MX lookup failed for {}: {}", domain, error);
                self.address_fallback(domain).await
            }
        }
    }

    /// Race A and AAAA under one shared budget once MX came back empty.
    async fn address_fallback(&self, domain: &str) -> DnsResult {
        let race = tokio::time::timeout(
            Duration::from_millis(ADDRESS_RACE_TIMEOUT_MS),
            async {
                tokio::join!(
                    self.client.resolve_a(domain),
                    self.client.resolve_aaaa(domain)
                )
            },
        );

        let (a, aaaa) = match race.await {
            Ok(results) => results,
            Err(_) => {
                warn!("A/AAAA race timed out for domain: {}", domain);
                return DnsResult::from_reason(DnsReason::Timeout);
            }
        };

        if matches!(a, Err(DnsLookupError::Timeout)) && matches!(aaaa, Err(DnsLookupError::Timeout))
        {
            return DnsResult::from_reason(DnsReason::Timeout);
        }

        let has_a = matches!(a, Ok(true));
        let has_aaaa = matches!(aaaa, Ok(true));

        if has_a || has_aaaa {
            let mut result = DnsResult::from_reason(DnsReason::AFallback);
            result.has_a = has_a;
            result.has_aaaa = has_aaaa;
            return result;
        }

        // Both lookups errored hard: the resolver itself is broken for this
        // domain, which is a different signal than a clean "nothing there"
        if a.is_err() && aaaa.is_err() {
            debug!("A and AAAA lookups both failed for domain: {}", domain);
            return DnsResult::from_reason(DnsReason::DnsError);
        }

        DnsResult::from_reason(DnsReason::NoMxNoA)
    }
}
