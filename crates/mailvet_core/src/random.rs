//! Randomness detection for email local parts
//!
//! Flags machine-generated local parts (`xk29dh73jz`) using four structural
//! metrics over the `[a-z0-9]`-normalized string: Shannon entropy, digit
//! ratio, vowel ratio and the longest run of consecutive consonants. A local
//! part is random when at least 2 of the 4 criteria fire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MIN_LENGTH: usize = 8;
const ENTROPY_THRESHOLD: f64 = 3.2;
const DIGIT_RATIO_THRESHOLD: f64 = 0.3;
const VOWEL_RATIO_THRESHOLD: f64 = 0.25;
const CONSECUTIVE_CONSONANTS_THRESHOLD: usize = 5;

/// Criteria that must fire before a local part is flagged
const MIN_CRITERIA: usize = 2;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

/// Raw metric values computed over the normalized local part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomnessMetrics {
    pub entropy: f64,
    pub digit_ratio: f64,
    pub vowel_ratio: f64,
    pub consecutive_consonants: usize,
    pub length: usize,
}

/// Full analysis result with a bounded 0-100 confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomnessAnalysis {
    pub is_random: bool,
    pub score: u8,
    pub metrics: RandomnessMetrics,
    pub details: String,
}

/// Pure, stateless detector.
#[derive(Debug, Default)]
pub struct RandomnessDetector;

impl RandomnessDetector {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a local part. Strings shorter than 8 normalized characters are
    /// never flagged.
    pub fn analyze(&self, local_part: &str) -> RandomnessAnalysis {
        let clean: String = local_part
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        let metrics = Self::compute_metrics(&clean);
        let too_short = clean.len() < MIN_LENGTH;

        let criteria = [
            metrics.entropy > ENTROPY_THRESHOLD,
            metrics.digit_ratio > DIGIT_RATIO_THRESHOLD,
            metrics.vowel_ratio < VOWEL_RATIO_THRESHOLD,
            metrics.consecutive_consonants >= CONSECUTIVE_CONSONANTS_THRESHOLD,
        ];
        let criteria_met = criteria.iter().filter(|&&met| met).count();

        let is_random = !too_short && criteria_met >= MIN_CRITERIA;
        let score = if too_short { 0 } else { Self::confidence(&metrics) };

        let details = if is_random {
            let mut reasons = Vec::new();
            if criteria[0] {
                reasons.push(format!("high entropy ({:.2})", metrics.entropy));
            }
            if criteria[1] {
                reasons.push(format!("too many digits ({:.0}%)", metrics.digit_ratio * 100.0));
            }
            if criteria[2] {
                reasons.push(format!("few vowels ({:.0}%)", metrics.vowel_ratio * 100.0));
            }
            if criteria[3] {
                reasons.push(format!(
                    "{} consecutive consonants",
                    metrics.consecutive_consonants
                ));
            }
            format!("Likely random: {}", reasons.join(", "))
        } else {
            "Local part appears legitimate".to_string()
        };

        RandomnessAnalysis {
            is_random,
            score,
            metrics,
            details,
        }
    }

    fn compute_metrics(clean: &str) -> RandomnessMetrics {
        let length = clean.len();
        if length == 0 {
            return RandomnessMetrics {
                entropy: 0.0,
                digit_ratio: 0.0,
                vowel_ratio: 0.0,
                consecutive_consonants: 0,
                length: 0,
            };
        }

        let digits = clean.chars().filter(|c| c.is_ascii_digit()).count();
        let vowels = clean.chars().filter(|c| VOWELS.contains(c)).count();

        RandomnessMetrics {
            entropy: shannon_entropy(clean),
            digit_ratio: digits as f64 / length as f64,
            vowel_ratio: vowels as f64 / length as f64,
            consecutive_consonants: max_consecutive_consonants(clean),
            length,
        }
    }

    /// Confidence sums up to 25 points per criterion, proportional to how far
    /// each metric exceeds its threshold; capped per criterion and at 100.
    fn confidence(metrics: &RandomnessMetrics) -> u8 {
        let mut score = 0.0f64;

        if metrics.entropy > ENTROPY_THRESHOLD {
            score += ((metrics.entropy - ENTROPY_THRESHOLD) * 15.0).min(25.0);
        }
        if metrics.digit_ratio > DIGIT_RATIO_THRESHOLD {
            score += ((metrics.digit_ratio - DIGIT_RATIO_THRESHOLD) * 80.0).min(25.0);
        }
        if metrics.vowel_ratio < VOWEL_RATIO_THRESHOLD {
            score += ((VOWEL_RATIO_THRESHOLD - metrics.vowel_ratio) * 100.0).min(25.0);
        }
        if metrics.consecutive_consonants >= CONSECUTIVE_CONSONANTS_THRESHOLD {
            let excess =
                (metrics.consecutive_consonants - CONSECUTIVE_CONSONANTS_THRESHOLD + 1) as f64;
            score += (excess * 5.0).min(25.0);
        }

        score.round().min(100.0) as u8
    }
}

fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn max_consecutive_consonants(s: &str) -> usize {
    let mut max = 0;
    let mut current = 0;

    for c in s.chars() {
        if c.is_ascii_lowercase() && !VOWELS.contains(&c) {
            current += 1;
            max = max.max(current);
        } else {
            current = 0;
        }
    }

    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repeated_chars_not_random() {
        let analysis = RandomnessDetector::new().analyze("aaaaaaaa");
        assert!(!analysis.is_random);
        assert_eq!(analysis.metrics.entropy, 0.0);
    }

    #[test]
    fn test_generated_local_part_is_random() {
        let analysis = RandomnessDetector::new().analyze("xk29dh73jz");
        assert!(analysis.is_random);
        // digit ratio 0.4 and zero vowels both exceed thresholds
        assert!(analysis.metrics.digit_ratio > DIGIT_RATIO_THRESHOLD);
        assert!(analysis.metrics.vowel_ratio < VOWEL_RATIO_THRESHOLD);
        assert!(analysis.score > 0);
    }

    #[test]
    fn test_short_strings_never_flagged() {
        let analysis = RandomnessDetector::new().analyze("x9z2");
        assert!(!analysis.is_random);
        assert_eq!(analysis.score, 0);
    }

    #[test]
    fn test_real_names_pass() {
        let detector = RandomnessDetector::new();
        assert!(!detector.analyze("jean.dupont").is_random);
        assert!(!detector.analyze("marie-claire").is_random);
        assert!(!detector.analyze("alexandre").is_random);
    }

    #[test]
    fn test_separator_chars_stripped_before_analysis() {
        let analysis = RandomnessDetector::new().analyze("a.b-c_d+e");
        assert_eq!(analysis.metrics.length, 5);
    }

    #[test]
    fn test_consonant_run_detection() {
        let analysis = RandomnessDetector::new().analyze("bcdfghjklm");
        assert!(analysis.metrics.consecutive_consonants >= 5);
        assert!(analysis.is_random); // consonant run + no vowels
    }

    #[test]
    fn test_score_bounded() {
        let detector = RandomnessDetector::new();
        for input in ["xk29dh73jz", "zzzzzzzz99999999", "qwrtpsdfghjklzxcvbnm123456"] {
            let analysis = detector.analyze(input);
            assert!(analysis.score <= 100);
        }
    }

    #[test]
    fn test_entropy_of_uniform_string() {
        // 10 distinct characters: entropy = log2(10) ~ 3.32
        let entropy = shannon_entropy("abcdefghij");
        assert!((entropy - 3.3219).abs() < 0.001);
    }
}
