//! Domain typo detection against a ranked table of popular mail domains
//!
//! Uses Damerau-Levenshtein distance (adjacent transposition counts as one
//! edit) with an allowed distance derived from the input length, early
//! termination once a row can no longer stay within budget, and a confidence
//! gate so only near-certain corrections are surfaced.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Popular mail domains with a relative popularity weight (higher = more
/// common). Order in the table is irrelevant; ranking uses the weight.
const POPULAR_DOMAINS: &[(&str, u32)] = &[
    ("gmail.com", 100),
    ("yahoo.com", 90),
    ("hotmail.com", 88),
    ("outlook.com", 85),
    ("icloud.com", 72),
    ("aol.com", 70),
    ("hotmail.fr", 66),
    ("orange.fr", 64),
    ("yahoo.fr", 60),
    ("live.com", 58),
    ("wanadoo.fr", 55),
    ("free.fr", 54),
    ("laposte.net", 52),
    ("sfr.fr", 50),
    ("protonmail.com", 48),
    ("proton.me", 46),
    ("web.de", 45),
    ("t-online.de", 44),
    ("gmx.de", 42),
    ("gmx.com", 40),
    ("mail.com", 38),
    ("yandex.ru", 36),
    ("msn.com", 35),
    ("qq.com", 34),
    ("me.com", 32),
    ("comcast.net", 30),
    ("naver.com", 28),
    ("libero.it", 26),
    ("ymail.com", 25),
    ("zoho.com", 22),
];

/// Minimum confidence before a suggestion is surfaced.
const MIN_CONFIDENCE: f64 = 0.75;

/// How the candidate set was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypoMatchSource {
    /// Candidates shared the input's TLD
    TldMatch,
    /// No popular domain carries the input's TLD; compared base-to-base
    Global,
}

/// A surfaced correction for a probably-mistyped domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypoSuggestion {
    pub original: String,
    pub suggestion: String,
    pub distance: usize,
    pub confidence: f64,
    pub matched_by: TypoMatchSource,
}

/// Suggester over the static popular-domain table.
#[derive(Debug, Default)]
pub struct TypoSuggester;

impl TypoSuggester {
    pub fn new() -> Self {
        Self
    }

    /// Suggest a correction for `domain`, or `None` when the domain is
    /// already correct, ambiguous, or too far from anything popular.
    pub fn suggest(&self, domain: &str) -> Option<TypoSuggestion> {
        let domain = domain.trim().to_lowercase();

        // Multi-label domains (mail.co.uk) are ambiguous: which label is the
        // typo? Refuse rather than guess.
        if domain.matches('.').count() >= 2 {
            return None;
        }

        let (base, tld) = match domain.rsplit_once('.') {
            Some((base, tld)) => (base, Some(tld)),
            None => (domain.as_str(), None),
        };

        if base.is_empty() {
            return None;
        }

        let max_distance = match base.len() {
            0..=5 => 1,
            6..=10 => 2,
            _ => 3,
        };

        let tld_candidates: Vec<&(&str, u32)> = match tld {
            Some(tld) => POPULAR_DOMAINS
                .iter()
                .filter(|(candidate, _)| candidate.ends_with(&format!(".{tld}")))
                .collect(),
            None => Vec::new(),
        };

        let (candidates, matched_by) = if tld_candidates.is_empty() {
            (POPULAR_DOMAINS.iter().collect(), TypoMatchSource::Global)
        } else {
            (tld_candidates, TypoMatchSource::TldMatch)
        };

        let mut scored: Vec<(&str, u32, usize, &str)> = candidates
            .into_iter()
            .filter_map(|&(candidate, popularity)| {
                let candidate_base = candidate.rsplit_once('.').map_or(candidate, |(b, _)| b);
                bounded_damerau_levenshtein(base, candidate_base, max_distance)
                    .map(|distance| (candidate, popularity, distance, candidate_base))
            })
            .collect();

        if scored.is_empty() {
            return None;
        }

        scored.sort_by(|a, b| a.2.cmp(&b.2).then(b.1.cmp(&a.1)));

        let (best, best_popularity, distance, best_base) = scored[0];

        if best == domain {
            return None; // already the popular domain itself
        }

        // Two candidates tied on both distance and popularity: genuinely
        // ambiguous, refuse to pick.
        if let Some(&(_, second_popularity, second_distance, _)) = scored.get(1) {
            if second_distance == distance && second_popularity == best_popularity {
                return None;
            }
        }

        let best_tld = best.rsplit_once('.').map(|(_, t)| t);
        let tld_bonus = if tld.is_some() && tld == best_tld { 0.1 } else { 0.0 };
        let longest = base.len().max(best_base.len()) as f64;
        let confidence = (1.0 - distance as f64 / longest + tld_bonus).clamp(0.0, 1.0);

        if confidence < MIN_CONFIDENCE {
            return None;
        }

        debug!(%domain, suggestion = best, distance, confidence, "typo suggestion");

        Some(TypoSuggestion {
            original: domain.clone(),
            suggestion: best.to_string(),
            distance,
            confidence,
            matched_by,
        })
    }
}

/// Damerau-Levenshtein distance (optimal string alignment variant) bounded by
/// `max`. Returns `None` as soon as no alignment can finish within `max`,
/// which keeps the computation from degenerating into full O(n*m) work for
/// hopeless candidates.
fn bounded_damerau_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let d = a.len().max(b.len());
        return (d <= max).then_some(d);
    }

    let width = b.len() + 1;
    let mut prev2 = vec![0usize; width];
    let mut prev: Vec<usize> = (0..width).collect();
    let mut current = vec![0usize; width];

    for i in 0..a.len() {
        current[0] = i + 1;
        let mut row_min = current[0];

        for j in 0..b.len() {
            let substitution_cost = usize::from(a[i] != b[j]);
            let mut d = (prev[j + 1] + 1)
                .min(current[j] + 1)
                .min(prev[j] + substitution_cost);

            if i > 0 && j > 0 && a[i] == b[j - 1] && a[i - 1] == b[j] {
                d = d.min(prev2[j - 1] + 1);
            }

            current[j + 1] = d;
            row_min = row_min.min(d);
        }

        if row_min > max {
            return None;
        }

        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }

    let distance = prev[b.len()];
    (distance <= max).then_some(distance)
}
