//! Reply classification using RFC 3463 enhanced status codes
//!
//! The RCPT reply is the only place a hard `fail` may be produced, and only
//! for mailbox-not-found evidence. Every other rejection stays `unknown`:
//! false negatives are cheaper than false positives here.

use regex::Regex;
use std::sync::LazyLock;

use super::{SmtpReasonCategory, SmtpStatus};

static ENHANCED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([245]\.\d+\.\d+)\b").unwrap()
});

/// Fallback for servers that reject with a bare 550 and a prose message.
static USER_UNKNOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)user unknown|no such user|mailbox not found|does not exist").unwrap()
});

pub(crate) struct RcptVerdict {
    pub status: SmtpStatus,
    pub exists: Option<bool>,
    pub category: SmtpReasonCategory,
}

pub(crate) fn extract_enhanced_code(message: &str) -> Option<String> {
    ENHANCED_CODE
        .captures(message)
        .map(|captures| captures[1].to_string())
}

/// Classify the terminal RCPT TO reply.
pub(crate) fn classify_rcpt(code: u16, message: &str) -> RcptVerdict {
    let enhanced = extract_enhanced_code(message);
    let enhanced = enhanced.as_deref();

    if code == 250 || code == 251 {
        return RcptVerdict {
            status: SmtpStatus::Pass,
            exists: Some(true),
            category: SmtpReasonCategory::Ok,
        };
    }

    if enhanced.is_some_and(|e| e.starts_with("5.1.")) {
        return RcptVerdict {
            status: SmtpStatus::Fail,
            exists: Some(false),
            category: SmtpReasonCategory::MailboxNotFound,
        };
    }

    if (400..500).contains(&code) || enhanced.is_some_and(|e| e.starts_with("4.")) {
        return RcptVerdict {
            status: SmtpStatus::Unknown,
            exists: None,
            category: SmtpReasonCategory::Temporary,
        };
    }

    if let Some(enhanced) = enhanced {
        let category = match enhanced {
            e if e.starts_with("5.7.") => Some(SmtpReasonCategory::Policy),
            e if e.starts_with("5.3.") => Some(SmtpReasonCategory::System),
            e if e.starts_with("5.4.") => Some(SmtpReasonCategory::Routing),
            _ => None,
        };
        if let Some(category) = category {
            return RcptVerdict {
                status: SmtpStatus::Unknown,
                exists: None,
                category,
            };
        }
    } else if code == 550 && USER_UNKNOWN.is_match(message) {
        return RcptVerdict {
            status: SmtpStatus::Fail,
            exists: Some(false),
            category: SmtpReasonCategory::MailboxNotFound,
        };
    }

    RcptVerdict {
        status: SmtpStatus::Unknown,
        exists: None,
        category: SmtpReasonCategory::Unknown,
    }
}

/// Classify a rejection that happened before RCPT TO. The status is always
/// `unknown`; only the category is refined.
pub(crate) fn classify_pre_rcpt(code: u16, message: &str) -> SmtpReasonCategory {
    let enhanced = extract_enhanced_code(message);
    let enhanced = enhanced.as_deref();

    if (400..500).contains(&code) || enhanced.is_some_and(|e| e.starts_with("4.")) {
        return SmtpReasonCategory::Temporary;
    }

    match enhanced {
        Some(e) if e.starts_with("5.7.") => SmtpReasonCategory::Policy,
        Some(e) if e.starts_with("5.4.") => SmtpReasonCategory::Routing,
        _ => SmtpReasonCategory::System,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_are_pass() {
        let verdict = classify_rcpt(250, "2.1.5 OK");
        assert_eq!(verdict.status, SmtpStatus::Pass);
        assert_eq!(verdict.exists, Some(true));
        assert_eq!(verdict.category, SmtpReasonCategory::Ok);

        let verdict = classify_rcpt(251, "user not local; will forward");
        assert_eq!(verdict.status, SmtpStatus::Pass);
    }

    #[test]
    fn test_5_1_x_is_mailbox_not_found() {
        let verdict = classify_rcpt(550, "5.1.1 user unknown");
        assert_eq!(verdict.status, SmtpStatus::Fail);
        assert_eq!(verdict.exists, Some(false));
        assert_eq!(verdict.category, SmtpReasonCategory::MailboxNotFound);
    }

    #[test]
    fn test_4xx_is_temporary() {
        let verdict = classify_rcpt(451, "4.3.0 busy");
        assert_eq!(verdict.status, SmtpStatus::Unknown);
        assert_eq!(verdict.category, SmtpReasonCategory::Temporary);

        // enhanced 4.x even on an odd 3-digit code
        let verdict = classify_rcpt(550, "4.2.1 mailbox temporarily disabled");
        assert_eq!(verdict.status, SmtpStatus::Unknown);
        assert_eq!(verdict.category, SmtpReasonCategory::Temporary);
    }

    #[test]
    fn test_policy_system_routing() {
        assert_eq!(
            classify_rcpt(550, "5.7.1 blocked by policy").category,
            SmtpReasonCategory::Policy
        );
        assert_eq!(
            classify_rcpt(554, "5.3.0 internal error").category,
            SmtpReasonCategory::System
        );
        assert_eq!(
            classify_rcpt(550, "5.4.1 relay access denied").category,
            SmtpReasonCategory::Routing
        );
    }

    #[test]
    fn test_bare_550_prose_fallback() {
        let verdict = classify_rcpt(550, "No such user here");
        assert_eq!(verdict.status, SmtpStatus::Fail);
        assert_eq!(verdict.category, SmtpReasonCategory::MailboxNotFound);

        // the prose fallback only applies without an enhanced code
        let verdict = classify_rcpt(550, "5.7.1 no such user allowed by policy");
        assert_eq!(verdict.status, SmtpStatus::Unknown);
        assert_eq!(verdict.category, SmtpReasonCategory::Policy);
    }

    #[test]
    fn test_other_5xx_never_guessed_as_fail() {
        let verdict = classify_rcpt(550, "rejected");
        assert_eq!(verdict.status, SmtpStatus::Unknown);
        assert_eq!(verdict.category, SmtpReasonCategory::Unknown);

        let verdict = classify_rcpt(554, "transaction failed");
        assert_eq!(verdict.status, SmtpStatus::Unknown);
    }

    #[test]
    fn test_enhanced_code_extraction() {
        assert_eq!(extract_enhanced_code("2.1.5 OK").as_deref(), Some("2.1.5"));
        assert_eq!(
            extract_enhanced_code("550 5.1.1 <x@y>: user unknown").as_deref(),
            Some("5.1.1")
        );
        assert_eq!(extract_enhanced_code("OK"), None);
        // 3.x.x is not a valid enhanced class
        assert_eq!(extract_enhanced_code("3.0.0 nope"), None);
    }

    #[test]
    fn test_pre_rcpt_classification() {
        assert_eq!(
            classify_pre_rcpt(421, "4.7.0 try again later"),
            SmtpReasonCategory::Temporary
        );
        assert_eq!(
            classify_pre_rcpt(554, "5.7.1 not authorized"),
            SmtpReasonCategory::Policy
        );
        assert_eq!(
            classify_pre_rcpt(554, "5.4.6 routing loop detected"),
            SmtpReasonCategory::Routing
        );
        assert_eq!(classify_pre_rcpt(554, "no service"), SmtpReasonCategory::System);
    }
}
