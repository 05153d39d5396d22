//! SMTP client session as an explicit state machine
//!
//! One tagged stage enum, a buffered CRLF line reader that folds multi-line
//! replies, and a pure transition function mapping `(stage, reply)` to the
//! next command or an exit. The driver in `mod.rs` owns timeouts and result
//! classification; this module only speaks the protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Protocol stage, in strict order. `Helo` is only entered when the server
/// rejects `EHLO` with 500/502.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmtpStage {
    Connect,
    Ehlo,
    Helo,
    MailFrom,
    RcptTo,
    Quit,
}

/// A complete server reply: the 3-digit code and the reply text with
/// multi-line continuations joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

/// How the session ended.
#[derive(Debug, Clone)]
pub enum SessionExit {
    /// Reached RCPT TO; the reply is returned raw for classification
    Rcpt(Reply),
    /// A 4xx reply before RCPT TO, always a temporary outcome
    Temporary { stage: SmtpStage, reply: Reply },
    /// An unexpected reply before RCPT TO
    Protocol { stage: SmtpStage, reply: Reply },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("SMTP i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed SMTP reply line: {0:?}")]
    MalformedReply(String),
}

pub(crate) struct SessionContext<'a> {
    pub helo_hostname: &'a str,
    pub mail_from: &'a str,
    pub recipient: String,
}

pub(crate) enum Step {
    /// Send `command` and move to `next`
    Send { next: SmtpStage, command: String },
    Exit(SessionExit),
}

/// Pure transition function. RCPT replies are terminal whatever their code;
/// everywhere else a 4xx is a temporary exit and anything off-script is a
/// protocol exit.
pub(crate) fn transition(stage: SmtpStage, reply: Reply, ctx: &SessionContext<'_>) -> Step {
    if stage == SmtpStage::RcptTo {
        return Step::Exit(SessionExit::Rcpt(reply));
    }

    if (400..500).contains(&reply.code) {
        return Step::Exit(SessionExit::Temporary { stage, reply });
    }

    match (stage, reply.code) {
        (SmtpStage::Connect, 220) => Step::Send {
            next: SmtpStage::Ehlo,
            command: format!("EHLO {}", ctx.helo_hostname),
        },
        (SmtpStage::Ehlo, 250) | (SmtpStage::Helo, 250) => Step::Send {
            next: SmtpStage::MailFrom,
            command: format!("MAIL FROM:<{}>", ctx.mail_from),
        },
        (SmtpStage::Ehlo, 500) | (SmtpStage::Ehlo, 502) => Step::Send {
            next: SmtpStage::Helo,
            command: format!("HELO {}", ctx.helo_hostname),
        },
        (SmtpStage::MailFrom, 250) => Step::Send {
            next: SmtpStage::RcptTo,
            command: format!("RCPT TO:<{}>", ctx.recipient),
        },
        _ => Step::Exit(SessionExit::Protocol { stage, reply }),
    }
}

/// Drive one session over an already-open connection up to the RCPT reply
/// (or an earlier exit). Sends QUIT best-effort before returning.
pub(crate) async fn run_session(
    stream: TcpStream,
    ctx: &SessionContext<'_>,
) -> Result<SessionExit, SessionError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut stage = SmtpStage::Connect;
    let exit = loop {
        let reply = read_reply(&mut reader).await?;
        debug!(?stage, code = reply.code, "SMTP reply");

        match transition(stage, reply, ctx) {
            Step::Send { next, command } => {
                debug!(?next, %command, "SMTP send");
                write_half
                    .write_all(format!("{command}\r\n").as_bytes())
                    .await?;
                stage = next;
            }
            Step::Exit(exit) => break exit,
        }
    };

    // Best-effort courtesy; the verdict is already decided
    let _ = write_half.write_all(b"QUIT\r\n").await;
    let _ = write_half.shutdown().await;

    Ok(exit)
}

/// Read one full reply, folding `XYZ-` continuation lines until the
/// `XYZ ` (or bare `XYZ`) final line.
async fn read_reply<R>(reader: &mut BufReader<R>) -> Result<Reply, SessionError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut parts: Vec<String> = Vec::new();

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-reply",
            )));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let code: u16 = line
            .get(0..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| SessionError::MalformedReply(line.to_string()))?;

        let continuation = line.as_bytes().get(3) == Some(&b'-');
        if let Some(text) = line.get(4..) {
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }

        if !continuation {
            return Ok(Reply {
                code,
                message: parts.join(" "),
            });
        }
    }
}
