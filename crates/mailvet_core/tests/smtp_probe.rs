//! SMTP probe integration tests against a scripted in-process server.

mod common;

use common::{spawn_smtp_server, SessionScript};
use mailvet_core::{
    DnsReason, DnsResult, EmailAddress, MxHost, SmtpConfig, SmtpProbe, SmtpReasonCategory,
    SmtpSkipReason, SmtpStage, SmtpStatus,
};

fn probe_config(port: u16) -> SmtpConfig {
    SmtpConfig {
        enabled: true,
        helo_hostname: "probe.example".to_string(),
        mail_from: "verify@probe.example".to_string(),
        timeout_ms: 2000,
        fail_fast: true,
        skip_disposable: true,
        port,
    }
}

fn dns_for(hosts: &[(&str, u16)]) -> DnsResult {
    DnsResult {
        reason: DnsReason::MxFound,
        mx_records: hosts
            .iter()
            .map(|(exchange, priority)| MxHost {
                exchange: exchange.to_string(),
                priority: *priority,
            })
            .collect(),
        has_a: false,
        has_aaaa: false,
        dns_timed_out: false,
        score: 100,
    }
}

fn email() -> EmailAddress {
    EmailAddress::parse("user@example.com").unwrap()
}

#[tokio::test]
async fn accepting_server_yields_pass() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 mx.test.example ESMTP"),
        exchanges: &[
            ("EHLO probe.example", "250 mx.test.example"),
            ("MAIL FROM:<verify@probe.example>", "250 2.1.0 OK"),
            ("RCPT TO:<user@example.com>", "250 2.1.5 OK"),
        ],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
        .await;

    assert_eq!(result.status, SmtpStatus::Pass);
    assert_eq!(result.exists, Some(true));
    assert_eq!(result.reason_category, SmtpReasonCategory::Ok);
    assert_eq!(result.stage, Some(SmtpStage::RcptTo));
    assert_eq!(result.response_code, Some(250));
    assert_eq!(result.enhanced_code.as_deref(), Some("2.1.5"));
    assert_eq!(result.mx_host.as_deref(), Some("127.0.0.1"));
    assert!(result.latency_ms.is_some());

    server.await.unwrap();
}

#[tokio::test]
async fn unknown_mailbox_yields_fail() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 mx.test.example ESMTP"),
        exchanges: &[
            ("EHLO probe.example", "250 mx.test.example"),
            ("MAIL FROM:<verify@probe.example>", "250 OK"),
            (
                "RCPT TO:<user@example.com>",
                "550 5.1.1 <user@example.com>: user unknown",
            ),
        ],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
        .await;

    assert_eq!(result.status, SmtpStatus::Fail);
    assert_eq!(result.exists, Some(false));
    assert_eq!(result.reason_category, SmtpReasonCategory::MailboxNotFound);
    assert_eq!(result.enhanced_code.as_deref(), Some("5.1.1"));

    server.await.unwrap();
}

#[tokio::test]
async fn ehlo_rejection_falls_back_to_helo() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 old.test.example SMTP"),
        exchanges: &[
            ("EHLO probe.example", "502 5.5.2 command not implemented"),
            ("HELO probe.example", "250 old.test.example"),
            ("MAIL FROM:<verify@probe.example>", "250 OK"),
            ("RCPT TO:<user@example.com>", "250 OK"),
        ],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
        .await;

    assert_eq!(result.status, SmtpStatus::Pass);
    server.await.unwrap();
}

#[tokio::test]
async fn multiline_ehlo_reply_is_folded() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 mx.test.example ESMTP"),
        exchanges: &[
            (
                "EHLO probe.example",
                "250-mx.test.example\n250-PIPELINING\n250-SIZE 10240000\n250 STARTTLS",
            ),
            ("MAIL FROM:<verify@probe.example>", "250 OK"),
            ("RCPT TO:<user@example.com>", "250 OK"),
        ],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
        .await;

    assert_eq!(result.status, SmtpStatus::Pass);
    server.await.unwrap();
}

#[tokio::test]
async fn temporary_rejection_before_rcpt_is_unknown() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 mx.test.example ESMTP"),
        exchanges: &[
            ("EHLO probe.example", "250 mx.test.example"),
            (
                "MAIL FROM:<verify@probe.example>",
                "451 4.3.2 please try again later",
            ),
        ],
    }])
    .await;

    let result = SmtpProbe::new(SmtpConfig {
        fail_fast: false,
        ..probe_config(addr.port())
    })
    .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
    .await;

    assert_eq!(result.status, SmtpStatus::Unknown);
    assert_eq!(result.reason_category, SmtpReasonCategory::Temporary);
    assert_eq!(result.stage, Some(SmtpStage::MailFrom));
    assert_eq!(result.response_code, Some(451));

    server.await.unwrap();
}

#[tokio::test]
async fn policy_banner_rejection_is_unknown_policy() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("554 5.7.1 connections not authorized"),
        exchanges: &[],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
        .await;

    assert_eq!(result.status, SmtpStatus::Unknown);
    assert_eq!(result.reason_category, SmtpReasonCategory::Policy);
    assert_eq!(result.stage, Some(SmtpStage::Connect));

    server.await.unwrap();
}

#[tokio::test]
async fn fail_fast_falls_over_to_second_host() {
    // Host #1 is inconclusive, host #2 accepts: sequential probing sends
    // connection one to the first script, connection two to the second.
    let (addr, server) = spawn_smtp_server(vec![
        SessionScript {
            banner: Some("421 4.3.2 service shutting down"),
            exchanges: &[],
        },
        SessionScript {
            banner: Some("220 mx.test.example ESMTP"),
            exchanges: &[
                ("EHLO probe.example", "250 mx.test.example"),
                ("MAIL FROM:<verify@probe.example>", "250 OK"),
                ("RCPT TO:<user@example.com>", "250 2.1.5 OK"),
            ],
        },
    ])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(
            &email(),
            &dns_for(&[("127.0.0.1", 10), ("127.0.0.1", 20)]),
            false,
        )
        .await;

    assert_eq!(result.status, SmtpStatus::Pass);
    server.await.unwrap();
}

#[tokio::test]
async fn fail_fast_conclusive_first_host_stops_there() {
    // One script only: a second connection would hit a closed listener
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: Some("220 mx.test.example ESMTP"),
        exchanges: &[
            ("EHLO probe.example", "250 mx.test.example"),
            ("MAIL FROM:<verify@probe.example>", "250 OK"),
            (
                "RCPT TO:<user@example.com>",
                "550 5.1.1 user unknown",
            ),
        ],
    }])
    .await;

    let result = SmtpProbe::new(probe_config(addr.port()))
        .probe(
            &email(),
            &dns_for(&[("127.0.0.1", 10), ("127.0.0.1", 20)]),
            false,
        )
        .await;

    assert_eq!(result.status, SmtpStatus::Fail);
    server.await.unwrap();
}

#[tokio::test]
async fn full_fallback_returns_last_inconclusive() {
    let scripts = vec![
        SessionScript {
            banner: Some("421 4.3.2 busy"),
            exchanges: &[],
        },
        SessionScript {
            banner: Some("421 4.3.2 busy"),
            exchanges: &[],
        },
        SessionScript {
            banner: Some("554 5.7.1 not authorized"),
            exchanges: &[],
        },
    ];
    let (addr, server) = spawn_smtp_server(scripts).await;

    let result = SmtpProbe::new(SmtpConfig {
        fail_fast: false,
        ..probe_config(addr.port())
    })
    .probe(
        &email(),
        &dns_for(&[("127.0.0.1", 5), ("127.0.0.1", 10), ("127.0.0.1", 20)]),
        false,
    )
    .await;

    // all three hosts probed; the last one decides the category
    assert_eq!(result.status, SmtpStatus::Unknown);
    assert_eq!(result.reason_category, SmtpReasonCategory::Policy);

    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out_as_network() {
    let (addr, server) = spawn_smtp_server(vec![SessionScript {
        banner: None,
        exchanges: &[],
    }])
    .await;

    let result = SmtpProbe::new(SmtpConfig {
        timeout_ms: 300,
        ..probe_config(addr.port())
    })
    .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), false)
    .await;

    assert_eq!(result.status, SmtpStatus::Unknown);
    assert_eq!(result.reason_category, SmtpReasonCategory::Network);
    assert!(result.message.contains("Timed out"));

    server.abort();
}

#[tokio::test]
async fn disposable_domain_is_skipped_before_connecting() {
    // No server at all: a connection attempt would fail the test with NETWORK
    let result = SmtpProbe::new(probe_config(1))
        .probe(&email(), &dns_for(&[("127.0.0.1", 10)]), true)
        .await;

    assert_eq!(result.status, SmtpStatus::Skipped);
    assert_eq!(result.skip_reason, Some(SmtpSkipReason::DisposableDomain));
}
