//! SMTP mailbox probe
//!
//! Opens a real connection to a domain's mail exchangers and negotiates just
//! far enough to issue `RCPT TO`, without ever sending a message. Hosts are
//! probed strictly in ascending priority order, one connection at a time,
//! each attempt bounded by a single deadline timer.

mod classify;
mod session;

pub use session::{SessionError, SmtpStage};

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::dns::DnsResult;
use crate::syntax::EmailAddress;

use classify::{classify_pre_rcpt, classify_rcpt, extract_enhanced_code};
use session::{run_session, SessionContext, SessionExit};

/// Externally supplied probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub helo_hostname: String,
    pub mail_from: String,
    pub timeout_ms: u64,
    /// Stop after two hosts at most; `false` walks the whole MX list
    pub fail_fast: bool,
    pub skip_disposable: bool,
    /// Default 25; frequently blocked by hosting providers
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            helo_hostname: "localhost".to_string(),
            mail_from: "verify@localhost".to_string(),
            timeout_ms: 5000,
            fail_fast: true,
            skip_disposable: true,
            port: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpStatus {
    Pass,
    Fail,
    Unknown,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmtpReasonCategory {
    Ok,
    MailboxNotFound,
    Temporary,
    Policy,
    System,
    Routing,
    Network,
    NoMx,
    Disposable,
    Disabled,
    Unknown,
}

impl SmtpReasonCategory {
    pub fn code(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::MailboxNotFound => "MAILBOX_NOT_FOUND",
            Self::Temporary => "TEMPORARY",
            Self::Policy => "POLICY",
            Self::System => "SYSTEM",
            Self::Routing => "ROUTING",
            Self::Network => "NETWORK",
            Self::NoMx => "NO_MX",
            Self::Disposable => "DISPOSABLE",
            Self::Disabled => "DISABLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Why the probe was skipped, always explicit, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmtpSkipReason {
    Disabled,
    DisposableDomain,
    NoMxRecords,
    DnsTimeout,
}

/// Outcome of one probe (possibly spanning several MX hosts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpResult {
    pub status: SmtpStatus,
    pub exists: Option<bool>,
    pub reason_category: SmtpReasonCategory,
    pub reason_code: String,
    pub stage: Option<SmtpStage>,
    pub response_code: Option<u16>,
    pub enhanced_code: Option<String>,
    pub mx_host: Option<String>,
    pub latency_ms: Option<u64>,
    pub timeout_ms: u64,
    pub message: String,
    pub skip_reason: Option<SmtpSkipReason>,
}

impl SmtpResult {
    fn skipped(reason: SmtpSkipReason, category: SmtpReasonCategory, message: &str, timeout_ms: u64) -> Self {
        Self {
            status: SmtpStatus::Skipped,
            exists: None,
            reason_category: category,
            reason_code: category.code().to_string(),
            stage: None,
            response_code: None,
            enhanced_code: None,
            mx_host: None,
            latency_ms: None,
            timeout_ms,
            message: message.to_string(),
            skip_reason: Some(reason),
        }
    }

    /// Conclusive means the probe answered the existence question.
    pub fn is_conclusive(&self) -> bool {
        matches!(self.status, SmtpStatus::Pass | SmtpStatus::Fail)
    }
}

pub struct SmtpProbe {
    config: SmtpConfig,
}

impl SmtpProbe {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Probe a mailbox across the domain's MX hosts.
    ///
    /// # Arguments
    /// * `email` - the candidate address
    /// * `dns` - the resolved DNS result carrying the MX list
    /// * `is_disposable` - whether the domain is a known disposable provider
    pub async fn probe(
        &self,
        email: &EmailAddress,
        dns: &DnsResult,
        is_disposable: bool,
    ) -> SmtpResult {
        let timeout_ms = self.config.timeout_ms;

        if !self.config.enabled {
            return SmtpResult::skipped(
                SmtpSkipReason::Disabled,
                SmtpReasonCategory::Disabled,
                "SMTP verification is disabled",
                timeout_ms,
            );
        }

        if is_disposable && self.config.skip_disposable {
            return SmtpResult::skipped(
                SmtpSkipReason::DisposableDomain,
                SmtpReasonCategory::Disposable,
                "Skipped for disposable domain",
                timeout_ms,
            );
        }

        if dns.dns_timed_out {
            return SmtpResult::skipped(
                SmtpSkipReason::DnsTimeout,
                SmtpReasonCategory::Unknown,
                "Skipped because DNS resolution timed out",
                timeout_ms,
            );
        }

        if dns.mx_records.is_empty() {
            return SmtpResult::skipped(
                SmtpSkipReason::NoMxRecords,
                SmtpReasonCategory::NoMx,
                "Domain has no MX records",
                timeout_ms,
            );
        }

        // MX records arrive pre-sorted ascending by priority
        let hosts: Vec<&str> = dns
            .mx_records
            .iter()
            .map(|host| host.exchange.as_str())
            .collect();

        if self.config.fail_fast {
            self.probe_fail_fast(email, &hosts).await
        } else {
            self.probe_full_fallback(email, &hosts).await
        }
    }

    /// Probe host #1; if inconclusive, one more host at most.
    async fn probe_fail_fast(&self, email: &EmailAddress, hosts: &[&str]) -> SmtpResult {
        let first = self.probe_host(hosts[0], email).await;
        if first.is_conclusive() {
            return first;
        }

        match hosts.get(1) {
            Some(second) => {
                debug!(host = second, "fail-fast: trying second MX host");
                self.probe_host(second, email).await
            }
            None => first,
        }
    }

    /// Probe every host in order; first conclusive result wins, otherwise
    /// the last inconclusive one is returned.
    async fn probe_full_fallback(&self, email: &EmailAddress, hosts: &[&str]) -> SmtpResult {
        let mut last = None;

        for host in hosts {
            let result = self.probe_host(host, email).await;
            if result.is_conclusive() {
                return result;
            }
            last = Some(result);
        }

        // hosts is never empty here
        last.unwrap_or_else(|| {
            SmtpResult::skipped(
                SmtpSkipReason::NoMxRecords,
                SmtpReasonCategory::NoMx,
                "Domain has no MX records",
                self.config.timeout_ms,
            )
        })
    }

    /// One connection, one deadline timer. On expiry the connection is torn
    /// down and the attempt resolves as a network outcome.
    async fn probe_host(&self, host: &str, email: &EmailAddress) -> SmtpResult {
        let timeout_ms = self.config.timeout_ms;
        let started = Instant::now();

        let ctx = SessionContext {
            helo_hostname: &self.config.helo_hostname,
            mail_from: &self.config.mail_from,
            recipient: email.to_string(),
        };

        let attempt = async {
            let stream = TcpStream::connect((host, self.config.port)).await?;
            run_session(stream, &ctx).await
        };

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            attempt,
        )
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        let base = |status, exists, category: SmtpReasonCategory, stage, code, message: String| {
            let enhanced_code = extract_enhanced_code(&message);
            SmtpResult {
                status,
                exists,
                reason_category: category,
                reason_code: category.code().to_string(),
                stage,
                response_code: code,
                enhanced_code,
                mx_host: Some(host.to_string()),
                latency_ms: Some(latency_ms),
                timeout_ms,
                message,
                skip_reason: None,
            }
        };

        match outcome {
            Ok(Ok(SessionExit::Rcpt(reply))) => {
                let verdict = classify_rcpt(reply.code, &reply.message);
                base(
                    verdict.status,
                    verdict.exists,
                    verdict.category,
                    Some(SmtpStage::RcptTo),
                    Some(reply.code),
                    reply.message,
                )
            }
            Ok(Ok(SessionExit::Temporary { stage, reply })) => base(
                SmtpStatus::Unknown,
                None,
                SmtpReasonCategory::Temporary,
                Some(stage),
                Some(reply.code),
                reply.message,
            ),
            Ok(Ok(SessionExit::Protocol { stage, reply })) => {
                let category = classify_pre_rcpt(reply.code, &reply.message);
                base(
                    SmtpStatus::Unknown,
                    None,
                    category,
                    Some(stage),
                    Some(reply.code),
                    reply.message,
                )
            }
            Ok(Err(SessionError::Io(error))) => {
                warn!(host, %error, "SMTP network error");
                base(
                    SmtpStatus::Unknown,
                    None,
                    SmtpReasonCategory::Network,
                    None,
                    None,
                    error.to_string(),
                )
            }
            Ok(Err(SessionError::MalformedReply(line))) => base(
                SmtpStatus::Unknown,
                None,
                SmtpReasonCategory::System,
                None,
                None,
                format!("Malformed reply: {line}"),
            ),
            Err(_) => {
                warn!(host, timeout_ms, "SMTP attempt timed out");
                base(
                    SmtpStatus::Unknown,
                    None,
                    SmtpReasonCategory::Network,
                    None,
                    None,
                    format!("Timed out after {timeout_ms}ms"),
                )
            }
        }
    }
}
