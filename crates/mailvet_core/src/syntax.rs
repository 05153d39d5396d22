//! Structural email syntax validation
//!
//! Checks are deterministic and run before anything that touches the network.
//! Each failure carries a stage-specific penalty score so the orchestrator can
//! surface a meaningful quality score even for rejected input.

use serde::{Deserialize, Serialize};

/// Characters allowed in the local part (RFC 5322 atext plus dot)
const LOCAL_PART_CHARS: &str = "!#$%&'*+/=?^_`{|}~.-";

/// A parsed, normalized email address.
///
/// The local part and domain are lower-cased and trimmed once at parse time
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Input as received (trimmed)
    pub raw: String,
    /// Lower-cased part before the `@`
    pub local_part: String,
    /// Lower-cased part after the `@`
    pub domain: String,
}

impl EmailAddress {
    /// Parse and normalize a candidate address, running all structural checks.
    pub fn parse(input: &str) -> Result<Self, SyntaxViolation> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(SyntaxViolation::new("Email cannot be empty", 0));
        }

        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(SyntaxViolation::new(
                "Email contains whitespace or control characters",
                5,
            ));
        }

        if trimmed.len() > 254 {
            return Err(SyntaxViolation::new(
                "Email is too long (max 254 characters)",
                10,
            ));
        }

        let mut parts = trimmed.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => {
                return Err(SyntaxViolation::new(
                    "Email must contain exactly one @",
                    15,
                ))
            }
        };

        validate_local_part(local)?;
        validate_domain(domain)?;

        Ok(Self {
            raw: trimmed.to_string(),
            local_part: local.to_lowercase(),
            domain: domain.to_lowercase(),
        })
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

/// A structural check failure with its stage-specific penalty score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxViolation {
    pub message: String,
    pub score: u8,
}

impl SyntaxViolation {
    fn new(message: &str, score: u8) -> Self {
        Self {
            message: message.to_string(),
            score,
        }
    }
}

/// Outcome of the syntax stage, kept in the verdict details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxReport {
    pub is_valid: bool,
    pub message: String,
    pub score: u8,
}

impl SyntaxReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: "Email syntax is valid".to_string(),
            score: 100,
        }
    }
}

impl From<&SyntaxViolation> for SyntaxReport {
    fn from(violation: &SyntaxViolation) -> Self {
        Self {
            is_valid: false,
            message: violation.message.clone(),
            score: violation.score,
        }
    }
}

fn validate_local_part(local: &str) -> Result<(), SyntaxViolation> {
    if local.is_empty() {
        return Err(SyntaxViolation::new("Local part is empty", 20));
    }

    if local.len() > 64 {
        return Err(SyntaxViolation::new(
            "Local part is too long (max 64 characters)",
            20,
        ));
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(SyntaxViolation::new(
            "Local part has leading, trailing or doubled dots",
            20,
        ));
    }

    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || LOCAL_PART_CHARS.contains(c))
    {
        return Err(SyntaxViolation::new(
            "Local part contains invalid characters",
            20,
        ));
    }

    Ok(())
}

fn validate_domain(domain: &str) -> Result<(), SyntaxViolation> {
    if domain.is_empty() {
        return Err(SyntaxViolation::new("Domain is empty", 20));
    }

    if domain.len() > 253 {
        return Err(SyntaxViolation::new(
            "Domain is too long (max 253 characters)",
            20,
        ));
    }

    if !domain.contains('.') {
        return Err(SyntaxViolation::new(
            "Domain must contain at least one dot",
            20,
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(SyntaxViolation::new("Domain has an invalid label", 20));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(SyntaxViolation::new(
                "Domain labels cannot start or end with a hyphen",
                20,
            ));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SyntaxViolation::new(
                "Domain labels must be alphanumeric or hyphens",
                20,
            ));
        }
    }

    // Last label is the TLD
    let tld = domain.rsplit('.').next().unwrap_or_default();
    if tld.len() < 2 {
        return Err(SyntaxViolation::new(
            "Top-level domain must be at least 2 characters",
            20,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_addresses() {
        let email = EmailAddress::parse("Jean.Dupont@Example.COM").unwrap();
        assert_eq!(email.local_part, "jean.dupont");
        assert_eq!(email.domain, "example.com");
        assert_eq!(email.raw, "Jean.Dupont@Example.COM");

        assert!(EmailAddress::parse("user+tag@sub.example.co.uk").is_ok());
        assert!(EmailAddress::parse("o'brien@example.ie").is_ok());
        assert!(EmailAddress::parse("  spaced@example.com  ").is_ok());
    }

    #[test]
    fn test_empty_email() {
        let err = EmailAddress::parse("").unwrap_err();
        assert_eq!(err.score, 0);

        let err = EmailAddress::parse("   ").unwrap_err();
        assert_eq!(err.score, 0);
    }

    #[test]
    fn test_whitespace_and_control() {
        let err = EmailAddress::parse("foo bar@example.com").unwrap_err();
        assert_eq!(err.score, 5);

        assert!(EmailAddress::parse("foo\tbar@example.com").is_err());
    }

    #[test]
    fn test_length_limits() {
        let long_local = "a".repeat(65);
        assert!(EmailAddress::parse(&format!("{long_local}@example.com")).is_err());

        let long_email = format!("{}@example.com", "a".repeat(250));
        let err = EmailAddress::parse(&long_email).unwrap_err();
        assert_eq!(err.score, 10);
    }

    #[test]
    fn test_at_sign_count() {
        let err = EmailAddress::parse("not-an-email").unwrap_err();
        assert_eq!(err.score, 15);

        assert!(EmailAddress::parse("a@b@example.com").is_err());
    }

    #[test]
    fn test_local_part_dots() {
        assert!(EmailAddress::parse(".leading@example.com").is_err());
        assert!(EmailAddress::parse("trailing.@example.com").is_err());
        assert!(EmailAddress::parse("dou..bled@example.com").is_err());
    }

    #[test]
    fn test_domain_rules() {
        assert!(EmailAddress::parse("user@nodot").is_err());
        assert!(EmailAddress::parse("user@-bad.com").is_err());
        assert!(EmailAddress::parse("user@bad-.com").is_err());
        assert!(EmailAddress::parse("user@under_score.com").is_err());
        assert!(EmailAddress::parse("user@example.c").is_err());
        assert!(EmailAddress::parse("user@example..com").is_err());
    }

    #[test]
    fn test_display() {
        let email = EmailAddress::parse("User@Example.com").unwrap();
        assert_eq!(email.to_string(), "user@example.com");
    }
}
