//! Validation pipeline: sequenced authoritative checks, concurrent heuristic
//! signals, and the deterministic scoring/verdict fold
//!
//! Stage order matters: syntax, whitelist and blacklist short-circuit before
//! any network work; DNS gates the SMTP probe; heuristics and the probe then
//! run together and are fused into one verdict. No failure of any sub-check
//! is allowed to abort verdict production.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::dns::{DnsClient, DnsReason, DnsResult, DomainResolver};
use crate::firstname::{FirstnameEnrichment, FirstnameExtractor};
use crate::random::{RandomnessAnalysis, RandomnessDetector};
use crate::reference::{
    DisposableCheck, ProfanityCheck, ProfanitySeverity, ReferenceSignalProvider, RoleCheck,
};
use crate::smtp::{SmtpConfig, SmtpProbe, SmtpReasonCategory, SmtpResult, SmtpStatus};
use crate::syntax::{EmailAddress, SyntaxReport};
use crate::typo::{TypoSuggester, TypoSuggestion};

/// Tri-state validity, derived strictly from syntax, DNS and SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub profanity: RiskLevel,
    pub overall: RiskLevel,
}

/// Everything the pipeline observed, for callers that want more than the
/// headline verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub syntax: SyntaxReport,
    pub whitelisted: bool,
    pub blacklisted: bool,
    pub dns: Option<DnsResult>,
    pub smtp: Option<SmtpResult>,
    pub disposable: Option<DisposableCheck>,
    pub role: Option<RoleCheck>,
    pub profanity: Option<ProfanityCheck>,
    pub randomness: Option<RandomnessAnalysis>,
    pub firstname: Option<FirstnameEnrichment>,
    pub typo: Option<TypoSuggestion>,
}

impl ValidationDetails {
    fn with_syntax(syntax: SyntaxReport) -> Self {
        Self {
            syntax,
            whitelisted: false,
            blacklisted: false,
            dns: None,
            smtp: None,
            disposable: None,
            role: None,
            profanity: None,
            randomness: None,
            firstname: None,
            typo: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub email: String,
    pub is_valid: Option<bool>,
    pub validity: Validity,
    pub score: u8,
    pub risk: RiskAssessment,
    pub reason: String,
    pub details: ValidationDetails,
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Run the SMTP probe (still subject to the probe's own skip rules)
    pub smtp: bool,
    /// Override the configured per-attempt SMTP timeout
    pub smtp_timeout_ms: Option<u64>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            smtp: true,
            smtp_timeout_ms: None,
        }
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidationReport {
    pub results: Vec<ValidationVerdict>,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub unknown_count: usize,
}

pub struct ValidationPipeline {
    provider: Arc<dyn ReferenceSignalProvider>,
    resolver: DomainResolver,
    smtp_config: SmtpConfig,
    randomness: RandomnessDetector,
    typo: TypoSuggester,
    firstname: FirstnameExtractor,
}

impl ValidationPipeline {
    pub fn new(
        provider: Arc<dyn ReferenceSignalProvider>,
        dns_client: Arc<dyn DnsClient>,
        smtp_config: SmtpConfig,
    ) -> Self {
        Self {
            resolver: DomainResolver::new(dns_client),
            randomness: RandomnessDetector::new(),
            typo: TypoSuggester::new(),
            firstname: FirstnameExtractor::new(Arc::clone(&provider)),
            provider,
            smtp_config,
        }
    }

    /// Validate one address end to end. Always produces a verdict.
    #[instrument(skip_all, fields(email = raw))]
    pub async fn validate(&self, raw: &str, options: &ValidateOptions) -> ValidationVerdict {
        // Stage 1: syntax
        let email = match EmailAddress::parse(raw) {
            Ok(email) => email,
            Err(violation) => {
                debug!(message = %violation.message, "syntax rejection");
                return ValidationVerdict {
                    email: raw.trim().to_string(),
                    is_valid: Some(false),
                    validity: Validity::Invalid,
                    score: violation.score,
                    risk: RiskAssessment {
                        profanity: RiskLevel::None,
                        overall: RiskLevel::High,
                    },
                    reason: violation.message.clone(),
                    details: ValidationDetails::with_syntax(SyntaxReport::from(&violation)),
                };
            }
        };

        let mut details = ValidationDetails::with_syntax(SyntaxReport::valid());

        // Stage 2: whitelist bypasses everything else
        if signal(self.provider.is_whitelisted(&email), "whitelist").unwrap_or(false) {
            details.whitelisted = true;
            return ValidationVerdict {
                email: email.to_string(),
                is_valid: Some(true),
                validity: Validity::Valid,
                score: 100,
                risk: RiskAssessment {
                    profanity: RiskLevel::None,
                    overall: RiskLevel::None,
                },
                reason: "Email is whitelisted".to_string(),
                details,
            };
        }

        // Stage 3: blacklist
        if signal(self.provider.is_blacklisted(&email), "blacklist").unwrap_or(false) {
            details.blacklisted = true;
            return ValidationVerdict {
                email: email.to_string(),
                is_valid: Some(false),
                validity: Validity::Invalid,
                score: 0,
                risk: RiskAssessment {
                    profanity: RiskLevel::None,
                    overall: RiskLevel::High,
                },
                reason: "Email is blacklisted".to_string(),
                details,
            };
        }

        // Stage 4: DNS
        let dns = self.resolver.resolve(&email.domain).await;
        if !dns.is_valid() {
            let reason = dns_rejection_reason(dns.reason);
            let score = dns.score;
            details.dns = Some(dns);
            details.typo = self.typo.suggest(&email.domain);
            return ValidationVerdict {
                email: email.to_string(),
                is_valid: Some(false),
                validity: Validity::Invalid,
                score,
                risk: RiskAssessment {
                    profanity: RiskLevel::None,
                    overall: RiskLevel::High,
                },
                reason: reason.to_string(),
                details,
            };
        }

        // Stage 5: heuristic signals alongside the optional SMTP probe. The
        // disposable check runs first because the probe's skip rules need it.
        let disposable = signal(
            self.provider.is_disposable_domain(&email.domain),
            "disposable",
        );
        let is_disposable = disposable.as_ref().is_some_and(|d| d.is_disposable);

        let smtp_future = async {
            if !options.smtp {
                return None;
            }
            let mut config = self.smtp_config.clone();
            if let Some(timeout_ms) = options.smtp_timeout_ms {
                config.timeout_ms = timeout_ms;
            }
            Some(SmtpProbe::new(config).probe(&email, &dns, is_disposable).await)
        };

        let heuristics_future = async {
            let role = signal(self.provider.is_role_account(&email), "role");
            let profanity = signal(self.provider.find_profanity(&email.local_part), "profanity");
            let randomness = self.randomness.analyze(&email.local_part);
            let firstname = self.firstname.extract(&email.local_part);
            let typo = self.typo.suggest(&email.domain);
            (role, profanity, randomness, firstname, typo)
        };

        let (smtp, (role, profanity, randomness, firstname, typo)) =
            tokio::join!(smtp_future, heuristics_future);

        details.disposable = disposable;
        details.role = role;
        details.profanity = profanity;
        details.randomness = Some(randomness);
        details.firstname = Some(firstname);
        details.typo = typo;
        details.smtp = smtp;
        details.dns = Some(dns);

        self.conclude(email, details)
    }

    /// Validate a slice of addresses sequentially and tally outcomes.
    pub async fn validate_batch(
        &self,
        emails: &[String],
        options: &ValidateOptions,
    ) -> BatchValidationReport {
        let mut results = Vec::with_capacity(emails.len());
        let mut valid_count = 0;
        let mut invalid_count = 0;
        let mut unknown_count = 0;

        for email in emails {
            let verdict = self.validate(email, options).await;
            match verdict.validity {
                Validity::Valid => valid_count += 1,
                Validity::Invalid => invalid_count += 1,
                Validity::Unknown => unknown_count += 1,
            }
            results.push(verdict);
        }

        BatchValidationReport {
            results,
            valid_count,
            invalid_count,
            unknown_count,
        }
    }

    /// Single-threaded fold over already-computed signals.
    fn conclude(&self, email: EmailAddress, details: ValidationDetails) -> ValidationVerdict {
        let profanity_risk = details
            .profanity
            .as_ref()
            .map_or(RiskLevel::None, |p| severity_risk(p.severity));

        let mut score: i32 = 100;

        score -= match profanity_risk {
            RiskLevel::High => 40,
            RiskLevel::Medium => 25,
            RiskLevel::Low => 10,
            RiskLevel::None => 0,
        };

        if details.disposable.as_ref().is_some_and(|d| d.is_disposable) {
            score -= 30;
        }

        if details.role.as_ref().is_some_and(|r| r.is_role) {
            score -= 15;
        }

        let is_random = details.randomness.as_ref().is_some_and(|r| r.is_random);
        if let Some(randomness) = details.randomness.as_ref() {
            if randomness.is_random {
                score -= match randomness.score {
                    s if s >= 80 => 25,
                    s if s >= 60 => 15,
                    _ => 5,
                };
            }
        }

        let smtp = details.smtp.as_ref();
        if let Some(smtp) = smtp {
            if smtp.status == SmtpStatus::Unknown {
                score -= match smtp.reason_category {
                    SmtpReasonCategory::Temporary => 20,
                    SmtpReasonCategory::Policy => 15,
                    SmtpReasonCategory::Network => 25,
                    _ => 30,
                };
            }
        }

        let multiplier = details
            .dns
            .as_ref()
            .map_or(1.0, |dns| dns.reason.confidence_multiplier());
        let mut score = ((score.max(0) as f64) * multiplier).round() as u8;

        let mailbox_missing = smtp.is_some_and(|s| {
            s.status == SmtpStatus::Fail
                && s.reason_category == SmtpReasonCategory::MailboxNotFound
        });
        if mailbox_missing {
            score = score.min(10);
        }

        // Validity is authoritative and independent of the score
        let (validity, is_valid, reason) = match smtp {
            None => (Validity::Valid, Some(true), "Email domain accepts mail"),
            Some(s) if s.status == SmtpStatus::Skipped || s.status == SmtpStatus::Pass => {
                (Validity::Valid, Some(true), "Email domain accepts mail")
            }
            Some(_) if mailbox_missing => {
                (Validity::Invalid, Some(false), "Mailbox does not exist")
            }
            Some(_) => (
                Validity::Unknown,
                None,
                "SMTP verification was inconclusive",
            ),
        };

        let overall = overall_risk(score, profanity_risk, &details, is_random);

        ValidationVerdict {
            email: email.to_string(),
            is_valid,
            validity,
            score,
            risk: RiskAssessment {
                profanity: profanity_risk,
                overall,
            },
            reason: reason.to_string(),
            details,
        }
    }
}

/// Reference lookups degrade to "signal absent", never abort the verdict.
fn signal<T>(result: Result<T>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%what, %error, "reference lookup failed, continuing without signal");
            None
        }
    }
}

fn severity_risk(severity: ProfanitySeverity) -> RiskLevel {
    match severity {
        ProfanitySeverity::High => RiskLevel::High,
        ProfanitySeverity::Medium => RiskLevel::Medium,
        ProfanitySeverity::Low => RiskLevel::Low,
        ProfanitySeverity::None => RiskLevel::None,
    }
}

fn dns_rejection_reason(reason: DnsReason) -> &'static str {
    match reason {
        DnsReason::NullMx => "Domain explicitly refuses mail (null MX)",
        DnsReason::NoMxNoA => "Domain has no mail infrastructure",
        DnsReason::DnsError => "DNS resolution failed for the domain",
        _ => "Domain DNS rejected",
    }
}

fn overall_risk(
    score: u8,
    profanity: RiskLevel,
    details: &ValidationDetails,
    is_random: bool,
) -> RiskLevel {
    let disposable = details.disposable.as_ref().is_some_and(|d| d.is_disposable);
    let role = details.role.as_ref().is_some_and(|r| r.is_role);

    if score < 40 || profanity == RiskLevel::High {
        RiskLevel::High
    } else if score < 70 || profanity == RiskLevel::Medium || disposable || is_random {
        RiskLevel::Medium
    } else if score < 85 || profanity == RiskLevel::Low || role {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}
