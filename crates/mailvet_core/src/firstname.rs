//! Firstname extraction and demographic enrichment from email local parts
//!
//! Tokenizes the local part, scores each token against the census firstname
//! table and the firstname/surname classification table, and only commits to
//! a firstname when one token clearly wins. Demographic fields (civility,
//! gender, presumed age) ride along from the winning token's census record.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::reference::{
    FirstnameRecord, Gender, LastnameFrequency, ReferenceSignalProvider, TokenClassification,
    TokenKind,
};

/// A token must beat the runner-up by this ratio before it is selected.
/// Tunable; two near-equal candidates mean the pattern is ambiguous.
const AMBIGUITY_RATIO: f64 = 1.2;

/// Minimum winning score before any firstname is asserted.
const MIN_SCORE: f64 = 50.0;

/// Gender is only asserted when the dominant share reaches this ratio.
const GENDER_CONFIDENCE_FLOOR: f64 = 0.85;

/// Tokens that are never firstnames regardless of the census table.
const TOKEN_BLACKLIST: &[&str] = &[
    "contact", "info", "admin", "support", "hello", "team", "sales", "mail", "no", "reply",
    "noreply", "service",
];

/// P25-P75 age interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

/// Enrichment derived from the winning token, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirstnameEnrichment {
    pub first_name: Option<String>,
    /// Winning token score, 0 when nothing was selected
    pub confidence: u8,
    pub civility: Option<String>,
    pub gender: Option<Gender>,
    pub gender_confidence: Option<f64>,
    pub presumed_age: Option<f64>,
    pub age_range: Option<AgeRange>,
    pub age_confidence: Option<f64>,
    pub peak_decade: Option<u32>,
    pub normalized_input: Option<String>,
}

struct ScoredToken {
    token: String,
    score: f64,
    record: FirstnameRecord,
}

/// Extractor over an injected reference provider.
pub struct FirstnameExtractor {
    provider: Arc<dyn ReferenceSignalProvider>,
}

impl FirstnameExtractor {
    pub fn new(provider: Arc<dyn ReferenceSignalProvider>) -> Self {
        Self { provider }
    }

    /// Extract a firstname (and its demographics) from a local part.
    /// Always returns a usable enrichment; reference lookup failures degrade
    /// to "no signal".
    pub fn extract(&self, local_part: &str) -> FirstnameEnrichment {
        let normalized = normalize(local_part);
        let tokens = tokenize(&normalized);

        if tokens.is_empty() {
            return FirstnameEnrichment {
                normalized_input: Some(normalized),
                ..Default::default()
            };
        }

        // Strength of the first token steers how later tokens are treated:
        // a weak lead promotes a surname-only second token (inverted
        // "dupont.jean" patterns), a strong lead demotes it.
        let first_strength = self.firstname_strength(&tokens[0]);

        let mut scored: Vec<ScoredToken> = Vec::new();
        for (position, token) in tokens.iter().enumerate() {
            if let Some(entry) = self.score_token(token, position, tokens.len(), first_strength) {
                if entry.score > 0.0 {
                    scored.push(entry);
                }
            }
        }

        let Some(best) = select_best(scored) else {
            return FirstnameEnrichment {
                normalized_input: Some(normalized),
                ..Default::default()
            };
        };

        let record = &best.record;
        let (civility, gender, gender_confidence) = deduce_civility(record);
        let age_range = match (record.age_p25, record.age_p50, record.age_p75) {
            (Some(p25), Some(p50), Some(p75)) => Some(AgeRange { p25, p50, p75 }),
            _ => None,
        };

        FirstnameEnrichment {
            first_name: Some(capitalize(&best.token)),
            confidence: best.score.round().clamp(0.0, 100.0) as u8,
            civility,
            gender,
            gender_confidence,
            presumed_age: record.estimated_age,
            age_confidence: Some(age_confidence(record.total_count, age_range.as_ref())),
            age_range,
            peak_decade: record.peak_decade,
            normalized_input: Some(normalized),
        }
    }

    /// How strongly a token reads as a firstname, in `[0, 1]`:
    /// census frequency, dampened for old-skewing names and for tokens also
    /// known as surnames.
    fn firstname_strength(&self, token: &str) -> f64 {
        let Some(record) = self.lookup_record(token) else {
            return 0.0;
        };
        let classification = self.lookup_classification(token);

        let frequency = frequency_score(record.total_count);
        frequency * modernity_factor(&record) * ambiguity_penalty(classification, &record)
    }

    fn score_token(
        &self,
        token: &str,
        position: usize,
        total_tokens: usize,
        first_strength: f64,
    ) -> Option<ScoredToken> {
        let record = self.lookup_record(token)?;
        let classification = self.lookup_classification(token);

        let frequency = frequency_score(record.total_count);
        let length = length_score(token.len());
        let position_bonus = position_bonus(position, total_tokens);
        let purity = if record.gender_ratio > 0.8 { 1.05 } else { 1.0 };
        let modernity = modernity_factor(&record);
        let ambiguity = ambiguity_factor(
            classification,
            position,
            total_tokens,
            first_strength,
        );

        let score =
            (100.0 * frequency * length * position_bonus * purity * modernity * ambiguity)
                .min(100.0);

        Some(ScoredToken {
            token: token.to_string(),
            score,
            record,
        })
    }

    fn lookup_record(&self, token: &str) -> Option<FirstnameRecord> {
        match self.provider.get_firstname(token) {
            Ok(record) => record,
            Err(error) => {
                warn!(%token, %error, "firstname lookup failed, treating as unknown");
                None
            }
        }
    }

    fn lookup_classification(&self, token: &str) -> Option<TokenClassification> {
        match self.provider.get_token_classification(token) {
            Ok(classification) => classification,
            Err(error) => {
                warn!(%token, %error, "token classification lookup failed, treating as ordinary");
                None
            }
        }
    }
}

/// NFKD-fold accents and lowercase.
fn normalize(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Split on the separator set, strip digit runs at the edges, drop short and
/// blacklisted tokens.
fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(['.', '-', '_', '+'])
        .map(clean_token)
        .filter(|t| t.len() >= 2)
        .filter(|t| !TOKEN_BLACKLIST.contains(&t.as_str()))
        .collect()
}

fn clean_token(token: &str) -> String {
    token
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

/// Census frequency mapped to `[0, 1]`; saturates around 3M occurrences.
fn frequency_score(total_count: u64) -> f64 {
    (((total_count + 1) as f64).log10() / 6.5).min(1.0)
}

/// Very short and very long tokens are less likely to be clean firstnames.
fn length_score(len: usize) -> f64 {
    match len {
        0..=2 => 0.7,
        3..=15 => 1.0,
        _ => 0.8,
    }
}

/// First token is the natural firstname slot; more so in `first.last`.
fn position_bonus(position: usize, total_tokens: usize) -> f64 {
    match (position, total_tokens) {
        (0, 2) => 1.15,
        (0, _) => 1.1,
        _ => 1.0,
    }
}

/// Boost younger-skewing names: a 1990s-peak name in an email is far more
/// plausible as a firstname than a 1920s-peak one.
fn modernity_factor(record: &FirstnameRecord) -> f64 {
    if let Some(age) = record.estimated_age {
        return match age {
            a if a <= 35.0 => 1.15,
            a if a <= 55.0 => 1.0,
            a if a <= 75.0 => 0.9,
            _ => 0.8,
        };
    }

    match record.peak_decade {
        Some(decade) if decade >= 1990 => 1.15,
        Some(decade) if decade >= 1960 => 1.0,
        Some(decade) if decade >= 1940 => 0.9,
        Some(_) => 0.8,
        None => 1.0,
    }
}

/// Strength discount for tokens also known as surnames, scaled by how common
/// the surname is and (for pre-1950 peaks) how dated the name reads.
fn ambiguity_penalty(
    classification: Option<TokenClassification>,
    record: &FirstnameRecord,
) -> f64 {
    let Some(classification) = classification else {
        return 1.0;
    };

    let base = match (classification.kind, classification.lastname_frequency) {
        (TokenKind::LastnameOnly, LastnameFrequency::High) => 0.30,
        (TokenKind::LastnameOnly, LastnameFrequency::Medium) => 0.45,
        (TokenKind::LastnameOnly, LastnameFrequency::Low) => 0.60,
        (TokenKind::Ambiguous, LastnameFrequency::High) => 0.60,
        (TokenKind::Ambiguous, LastnameFrequency::Medium) => 0.75,
        (TokenKind::Ambiguous, LastnameFrequency::Low) => 0.85,
    };

    match record.peak_decade {
        Some(decade) if decade < 1950 => base * 0.85,
        _ => base,
    }
}

/// Position-aware ambiguity factor for the token score. A surname-only token
/// in second position is heavily discounted when the first token already
/// reads as a firstname, and promoted when it does not.
fn ambiguity_factor(
    classification: Option<TokenClassification>,
    position: usize,
    total_tokens: usize,
    first_strength: f64,
) -> f64 {
    let Some(classification) = classification else {
        return 1.0;
    };

    let trailing = position > 0 && total_tokens >= 2;

    match classification.kind {
        TokenKind::LastnameOnly if trailing => {
            if first_strength >= 0.5 {
                0.2
            } else {
                1.1
            }
        }
        TokenKind::LastnameOnly => match classification.lastname_frequency {
            LastnameFrequency::High => 0.5,
            LastnameFrequency::Medium => 0.65,
            LastnameFrequency::Low => 0.8,
        },
        TokenKind::Ambiguous if trailing => {
            if first_strength >= 0.5 {
                0.5
            } else {
                0.9
            }
        }
        TokenKind::Ambiguous => match classification.lastname_frequency {
            LastnameFrequency::High => 0.7,
            LastnameFrequency::Medium => 0.8,
            LastnameFrequency::Low => 0.9,
        },
    }
}

/// Double guard: absolute threshold, then the best must clearly beat the
/// runner-up.
fn select_best(mut scored: Vec<ScoredToken>) -> Option<ScoredToken> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let second_score = scored.get(1).map(|s| s.score);
    let best = scored.into_iter().next()?;

    if best.score < MIN_SCORE {
        return None;
    }

    if let Some(second) = second_score {
        if best.score < second * AMBIGUITY_RATIO {
            return None;
        }
    }

    Some(best)
}

/// Capitalize, keeping compound names intact (`jean-pierre` -> `Jean-Pierre`).
fn capitalize(token: &str) -> String {
    token
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn deduce_civility(record: &FirstnameRecord) -> (Option<String>, Option<Gender>, Option<f64>) {
    let total = record.male_count + record.female_count;
    if total == 0 {
        return (None, None, None);
    }

    let p_male = record.male_count as f64 / total as f64;
    let p_female = record.female_count as f64 / total as f64;

    if p_male >= GENDER_CONFIDENCE_FLOOR {
        return (Some("M.".to_string()), Some(Gender::Male), Some(p_male));
    }
    if p_female >= GENDER_CONFIDENCE_FLOOR {
        return (Some("Mme".to_string()), Some(Gender::Female), Some(p_female));
    }

    // Mixed names (Camille, Dominique): report the share, assert nothing
    (None, None, Some(p_male.max(p_female)))
}

/// Blend of sample size and interquartile tightness: a huge sample with a
/// narrow P25-P75 band pins the age down, a wide band does not.
fn age_confidence(total_count: u64, age_range: Option<&AgeRange>) -> f64 {
    let base: f64 = match total_count {
        c if c > 100_000 => 0.9,
        c if c > 10_000 => 0.75,
        c if c > 1_000 => 0.6,
        _ => 0.3,
    };

    let adjustment = match age_range {
        Some(range) => {
            let iqr = range.p75 - range.p25;
            if iqr <= 15.0 {
                0.05
            } else if iqr >= 40.0 {
                -0.1
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    (base + adjustment).clamp(0.0, 1.0)
}
