//! # mailvet_core
//!
//! Email deliverability and quality assessment without sending mail.
//!
//! ## Features
//!
//! - **SMTP mailbox probe**: a minimal client state machine that negotiates up
//!   to `RCPT TO`, classifies replies via RFC 3463 enhanced status codes, and
//!   falls back across MX hosts under strict time budgets
//! - **DNS mail-infrastructure resolution** via hickory-resolver (MX first,
//!   A/AAAA race fallback, null-MX detection)
//! - **Heuristic risk signals**: disposable domains (Bloom filter), role
//!   accounts, profanity, entropy-based randomness detection, domain typo
//!   suggestions, and demographic firstname extraction
//! - **One deterministic verdict**: tri-state validity, a 0-100 quality score
//!   and a risk classification, always produced, never thrown past
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mailvet_core::{
//!     HickoryDnsClient, SmtpConfig, StaticReferenceProvider, ValidateOptions,
//!     ValidationPipeline,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ValidationPipeline::new(
//!         Arc::new(StaticReferenceProvider::new()),
//!         Arc::new(HickoryDnsClient::default()),
//!         SmtpConfig::default(),
//!     );
//!
//!     let verdict = pipeline
//!         .validate("jean.dupont@example.com", &ValidateOptions::default())
//!         .await;
//!     println!("validity: {:?}, score: {}", verdict.validity, verdict.score);
//! }
//! ```

pub mod dns;
pub mod firstname;
pub mod pipeline;
pub mod random;
pub mod reference;
pub mod smtp;
pub mod syntax;
pub mod typo;

// Re-export the main entry points
pub use dns::{DnsClient, DnsLookupError, DnsReason, DnsResult, DomainResolver, HickoryDnsClient, MxHost};
pub use firstname::{AgeRange, FirstnameEnrichment, FirstnameExtractor};
pub use pipeline::{
    BatchValidationReport, RiskAssessment, RiskLevel, ValidateOptions, ValidationDetails,
    ValidationPipeline, ValidationVerdict, Validity,
};
pub use random::{RandomnessAnalysis, RandomnessDetector, RandomnessMetrics};
pub use reference::{
    DisposableCheck, FirstnameRecord, Gender, LastnameFrequency, ProfanityCheck,
    ProfanitySeverity, ReferenceSignalProvider, RoleCheck, StaticReferenceProvider,
    TokenClassification, TokenKind,
};
pub use smtp::{
    SessionError, SmtpConfig, SmtpProbe, SmtpReasonCategory, SmtpResult, SmtpSkipReason,
    SmtpStage, SmtpStatus,
};
pub use syntax::{EmailAddress, SyntaxReport, SyntaxViolation};
pub use typo::{TypoMatchSource, TypoSuggester, TypoSuggestion};
