//! Read-only reference signal lookups
//!
//! The core never owns reference data. Everything list-shaped (whitelist,
//! blacklist, disposable domains, role patterns, profanity words, firstname
//! frequency table, token classifications) is reached through the
//! [`ReferenceSignalProvider`] trait so storage stays an external concern.
//!
//! [`StaticReferenceProvider`] is an immutable in-memory snapshot
//! implementation used by tests and by embedders that load their datasets
//! once at startup.

use anyhow::Result;
use fastbloom::BloomFilter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::syntax::EmailAddress;

/// Severity attached to a profanity match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfanitySeverity {
    None,
    Low,
    Medium,
    High,
}

/// Dominant gender recorded for a firstname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// Aggregated census data for one normalized firstname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstnameRecord {
    pub male_count: u64,
    pub female_count: u64,
    pub total_count: u64,
    /// Share of the dominant gender, in `[0.5, 1.0]`
    pub gender_ratio: f64,
    pub dominant_gender: Option<Gender>,
    pub estimated_age: Option<f64>,
    pub age_p25: Option<f64>,
    pub age_p50: Option<f64>,
    pub age_p75: Option<f64>,
    pub peak_decade: Option<u32>,
}

/// How common a token is as a surname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastnameFrequency {
    High,
    Medium,
    Low,
}

/// Token kinds the classification table distinguishes. A token absent from
/// the table is an ordinary firstname or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Ambiguous,
    LastnameOnly,
}

/// Classification of a known token (firstname/surname ambiguity data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClassification {
    pub kind: TokenKind,
    pub lastname_frequency: LastnameFrequency,
}

/// Disposable-domain lookup result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisposableCheck {
    pub is_disposable: bool,
    pub provider: Option<String>,
}

/// Role-account lookup result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCheck {
    pub is_role: bool,
    pub pattern: Option<String>,
    pub confidence: f64,
}

/// Profanity lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfanityCheck {
    pub words: Vec<String>,
    pub severity: ProfanitySeverity,
}

impl Default for ProfanityCheck {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            severity: ProfanitySeverity::None,
        }
    }
}

/// Read-only lookups against the reference datasets.
///
/// All methods are fallible so implementations backed by remote storage can
/// surface lookup failures; the orchestrator degrades gracefully when they do.
pub trait ReferenceSignalProvider: Send + Sync {
    fn is_whitelisted(&self, email: &EmailAddress) -> Result<bool>;
    fn is_blacklisted(&self, email: &EmailAddress) -> Result<bool>;
    fn is_disposable_domain(&self, domain: &str) -> Result<DisposableCheck>;
    fn is_role_account(&self, email: &EmailAddress) -> Result<RoleCheck>;
    fn find_profanity(&self, local_part: &str) -> Result<ProfanityCheck>;
    fn get_firstname(&self, name: &str) -> Result<Option<FirstnameRecord>>;
    fn get_token_classification(&self, token: &str) -> Result<Option<TokenClassification>>;
}

/// Built-in role-account patterns (FR + EN), lowercase and accent-free.
const BUILT_IN_ROLE_PATTERNS: &[&str] = &[
    // Generic
    "info", "contact", "support", "help", "admin", "administrator", "service", "team", "office",
    "hello", "hi",
    // No-reply / automation
    "noreply", "no-reply", "donotreply", "do-not-reply", "mailer-daemon", "bounce", "bounces",
    "newsletter", "newsletters",
    // RFC / infra
    "webmaster", "postmaster", "hostmaster", "abuse", "security", "privacy",
    // Commercial
    "sales", "commercial", "business", "partners", "partnership", "pricing", "billing",
    "accounts", "finance", "marketing", "press", "media",
    // Support / SAV (FR)
    "sav", "assistance", "aide", "reclamation", "reclamations", "accueil", "standard",
    "secretariat", "direction", "compta", "comptabilite", "facturation", "recrutement",
    "candidature", "juridique", "legal", "rgpd", "dpo",
    // IT
    "it", "informatique", "tech", "engineering", "dev", "devops",
    // Misc
    "careers", "jobs", "hr", "rh", "feedback", "enquiries", "inquiry",
];

/// Immutable in-memory snapshot of all reference datasets.
///
/// Disposable domains live in a Bloom filter for memory efficiency (the public
/// lists run to six figures); an optional exact map carries provider labels
/// for the domains an embedder cares to name.
pub struct StaticReferenceProvider {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
    disposable_filter: Option<BloomFilter>,
    disposable_providers: HashMap<String, String>,
    role_patterns: Vec<String>,
    profanity_words: HashMap<String, ProfanitySeverity>,
    firstnames: HashMap<String, FirstnameRecord>,
    token_classifications: HashMap<String, TokenClassification>,
}

impl StaticReferenceProvider {
    /// Empty snapshot with the built-in role patterns.
    pub fn new() -> Self {
        Self {
            whitelist: HashSet::new(),
            blacklist: HashSet::new(),
            disposable_filter: None,
            disposable_providers: HashMap::new(),
            role_patterns: BUILT_IN_ROLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            profanity_words: HashMap::new(),
            firstnames: HashMap::new(),
            token_classifications: HashMap::new(),
        }
    }

    /// Whitelist entries: exact emails or bare domains.
    pub fn with_whitelist<I: IntoIterator<Item = String>>(mut self, entries: I) -> Self {
        self.whitelist = entries.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Blacklist entries: exact emails or bare domains.
    pub fn with_blacklist<I: IntoIterator<Item = String>>(mut self, entries: I) -> Self {
        self.blacklist = entries.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Load the disposable-domain set into a Bloom filter with the given
    /// false-positive rate.
    pub fn with_disposable_domains<I: IntoIterator<Item = String>>(
        mut self,
        domains: I,
        false_positive_rate: f64,
    ) -> Self {
        let items: Vec<String> = domains.into_iter().map(|d| d.to_lowercase()).collect();
        if items.is_empty() {
            self.disposable_filter = None;
            return self;
        }

        debug!(
            domains = items.len(),
            fp_rate = false_positive_rate,
            "building disposable-domain filter"
        );
        self.disposable_filter =
            Some(BloomFilter::with_false_pos(false_positive_rate).items(items));
        self
    }

    /// Name the provider behind specific disposable domains.
    pub fn with_disposable_providers<I: IntoIterator<Item = (String, String)>>(
        mut self,
        entries: I,
    ) -> Self {
        self.disposable_providers = entries
            .into_iter()
            .map(|(d, p)| (d.to_lowercase(), p))
            .collect();
        self
    }

    /// Replace the role patterns entirely.
    pub fn with_role_patterns<I: IntoIterator<Item = String>>(mut self, patterns: I) -> Self {
        self.role_patterns = patterns.into_iter().map(|p| p.to_lowercase()).collect();
        self
    }

    pub fn with_profanity_words<I: IntoIterator<Item = (String, ProfanitySeverity)>>(
        mut self,
        words: I,
    ) -> Self {
        self.profanity_words = words
            .into_iter()
            .map(|(w, s)| (w.to_lowercase(), s))
            .collect();
        self
    }

    pub fn with_firstname(mut self, name: &str, record: FirstnameRecord) -> Self {
        self.firstnames.insert(name.to_lowercase(), record);
        self
    }

    pub fn with_firstnames<I: IntoIterator<Item = (String, FirstnameRecord)>>(
        mut self,
        names: I,
    ) -> Self {
        self.firstnames
            .extend(names.into_iter().map(|(n, r)| (n.to_lowercase(), r)));
        self
    }

    pub fn with_token_classification(
        mut self,
        token: &str,
        classification: TokenClassification,
    ) -> Self {
        self.token_classifications
            .insert(token.to_lowercase(), classification);
        self
    }

    /// Normalize a local part for role matching: `_` folds to `-` and a
    /// trailing digit run is dropped (`facturation2024` matches `facturation`).
    fn normalize_role_local(local_part: &str) -> String {
        let folded = local_part.replace('_', "-");
        folded.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
    }
}

impl Default for StaticReferenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSignalProvider for StaticReferenceProvider {
    fn is_whitelisted(&self, email: &EmailAddress) -> Result<bool> {
        Ok(self.whitelist.contains(&email.to_string()) || self.whitelist.contains(&email.domain))
    }

    fn is_blacklisted(&self, email: &EmailAddress) -> Result<bool> {
        Ok(self.blacklist.contains(&email.to_string()) || self.blacklist.contains(&email.domain))
    }

    fn is_disposable_domain(&self, domain: &str) -> Result<DisposableCheck> {
        let normalized = domain.to_lowercase();
        let is_disposable = self
            .disposable_filter
            .as_ref()
            .is_some_and(|filter| filter.contains(&normalized));

        Ok(DisposableCheck {
            is_disposable,
            provider: if is_disposable {
                self.disposable_providers.get(&normalized).cloned()
            } else {
                None
            },
        })
    }

    /// Three-level match: exact local part (1.0), token (0.95), then
    /// substring for patterns of 4+ chars (0.7, avoids `smith` matching `it`).
    fn is_role_account(&self, email: &EmailAddress) -> Result<RoleCheck> {
        let local = Self::normalize_role_local(&email.local_part);
        let tokens: Vec<&str> = local.split(['-', '.', '+']).filter(|t| !t.is_empty()).collect();

        for pattern in &self.role_patterns {
            if local == *pattern {
                return Ok(RoleCheck {
                    is_role: true,
                    pattern: Some(pattern.clone()),
                    confidence: 1.0,
                });
            }
        }

        for pattern in &self.role_patterns {
            if tokens.iter().any(|t| t == pattern) {
                return Ok(RoleCheck {
                    is_role: true,
                    pattern: Some(pattern.clone()),
                    confidence: 0.95,
                });
            }
        }

        for pattern in &self.role_patterns {
            if pattern.len() >= 4 && local.contains(pattern.as_str()) {
                return Ok(RoleCheck {
                    is_role: true,
                    pattern: Some(pattern.clone()),
                    confidence: 0.7,
                });
            }
        }

        Ok(RoleCheck::default())
    }

    fn find_profanity(&self, local_part: &str) -> Result<ProfanityCheck> {
        let normalized = local_part.to_lowercase();
        let tokens: Vec<&str> = normalized
            .split(['.', '-', '_', '+'])
            .filter(|t| !t.is_empty())
            .collect();

        let mut words = Vec::new();
        let mut severity = ProfanitySeverity::None;

        for (word, word_severity) in &self.profanity_words {
            let token_hit = tokens.iter().any(|t| t == word);
            // Substring matching only for longer words, to avoid flagging
            // names that merely contain a short word.
            let substring_hit = word.len() >= 4 && normalized.contains(word.as_str());

            if token_hit || substring_hit {
                words.push(word.clone());
                severity = severity.max(*word_severity);
            }
        }

        words.sort();
        Ok(ProfanityCheck { words, severity })
    }

    fn get_firstname(&self, name: &str) -> Result<Option<FirstnameRecord>> {
        Ok(self.firstnames.get(&name.to_lowercase()).cloned())
    }

    fn get_token_classification(&self, token: &str) -> Result<Option<TokenClassification>> {
        Ok(self.token_classifications.get(&token.to_lowercase()).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn email(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    #[test]
    fn test_whitelist_email_and_domain() {
        let provider = StaticReferenceProvider::new().with_whitelist(vec![
            "vip@company.com".to_string(),
            "partner.org".to_string(),
        ]);

        assert!(provider.is_whitelisted(&email("VIP@company.com")).unwrap());
        assert!(provider.is_whitelisted(&email("anyone@partner.org")).unwrap());
        assert!(!provider.is_whitelisted(&email("other@company.com")).unwrap());
    }

    #[test]
    fn test_disposable_filter() {
        let provider = StaticReferenceProvider::new()
            .with_disposable_domains(
                vec!["10minutemail.com".to_string(), "tempmail.org".to_string()],
                0.0001,
            )
            .with_disposable_providers(vec![(
                "10minutemail.com".to_string(),
                "10 Minute Mail".to_string(),
            )]);

        let check = provider.is_disposable_domain("10minutemail.com").unwrap();
        assert!(check.is_disposable);
        assert_eq!(check.provider.as_deref(), Some("10 Minute Mail"));

        assert!(provider.is_disposable_domain("TEMPMAIL.ORG").unwrap().is_disposable);
        assert!(!provider.is_disposable_domain("gmail.com").unwrap().is_disposable);
    }

    #[test]
    fn test_disposable_empty_list() {
        let provider = StaticReferenceProvider::new();
        assert!(!provider.is_disposable_domain("anything.com").unwrap().is_disposable);
    }

    #[test]
    fn test_role_exact_match() {
        let provider = StaticReferenceProvider::new();
        let check = provider.is_role_account(&email("contact@example.com")).unwrap();
        assert!(check.is_role);
        assert_eq!(check.confidence, 1.0);
        assert_eq!(check.pattern.as_deref(), Some("contact"));
    }

    #[test]
    fn test_role_token_match() {
        let provider = StaticReferenceProvider::new();
        let check = provider.is_role_account(&email("info-fr@example.com")).unwrap();
        assert!(check.is_role);
        assert_eq!(check.confidence, 0.95);
        assert_eq!(check.pattern.as_deref(), Some("info"));
    }

    #[test]
    fn test_role_substring_match() {
        let provider = StaticReferenceProvider::new();
        let check = provider
            .is_role_account(&email("serviceclient@example.com"))
            .unwrap();
        assert!(check.is_role);
        assert_eq!(check.confidence, 0.7);
    }

    #[test]
    fn test_role_short_pattern_needs_token() {
        // "smith" contains "it" but short patterns never substring-match
        let provider = StaticReferenceProvider::new();
        let check = provider.is_role_account(&email("smith@example.com")).unwrap();
        assert!(!check.is_role);
    }

    #[test]
    fn test_role_trailing_digits_and_underscores() {
        let provider = StaticReferenceProvider::new();
        let check = provider
            .is_role_account(&email("facturation2024@example.com"))
            .unwrap();
        assert!(check.is_role);
        assert_eq!(check.confidence, 1.0);

        let check = provider.is_role_account(&email("contact_fr@example.com")).unwrap();
        assert!(check.is_role);
        assert_eq!(check.confidence, 0.95);
    }

    #[test]
    fn test_profanity_max_severity() {
        let provider = StaticReferenceProvider::new().with_profanity_words(vec![
            ("merde".to_string(), ProfanitySeverity::Medium),
            ("fuck".to_string(), ProfanitySeverity::High),
        ]);

        let check = provider.find_profanity("fuck.merde").unwrap();
        assert_eq!(check.words.len(), 2);
        assert_eq!(check.severity, ProfanitySeverity::High);

        let check = provider.find_profanity("jean.dupont").unwrap();
        assert!(check.words.is_empty());
        assert_eq!(check.severity, ProfanitySeverity::None);
    }

    #[test]
    fn test_firstname_lookup_is_case_insensitive() {
        let record = FirstnameRecord {
            male_count: 100,
            female_count: 0,
            total_count: 100,
            gender_ratio: 1.0,
            dominant_gender: Some(Gender::Male),
            estimated_age: Some(40.0),
            age_p25: None,
            age_p50: None,
            age_p75: None,
            peak_decade: Some(1980),
        };
        let provider = StaticReferenceProvider::new().with_firstname("Jean", record.clone());

        assert_eq!(provider.get_firstname("JEAN").unwrap(), Some(record));
        assert_eq!(provider.get_firstname("marie").unwrap(), None);
    }
}
