//! Scripted in-process SMTP server and DNS stubs shared by the integration
//! tests. No test here touches the live network.

// Each test binary uses its own subset of this module
#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Once;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

use mailvet_core::{DnsClient, DnsLookupError, MxHost};

static TRACING: Once = Once::new();

/// Route tracing output through the test harness so it shows up under
/// `--nocapture` when a scripted session misbehaves.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// One scripted SMTP session: the banner to greet with (possibly multi-line,
/// `None` to stay silent and let the client time out) and the expected
/// request/response exchanges in order.
pub struct SessionScript {
    pub banner: Option<&'static str>,
    pub exchanges: &'static [(&'static str, &'static str)],
}

/// Spawn a mock server that accepts one connection per script, in order.
/// Panics (inside the task) on any request that deviates from the script,
/// which surfaces when the caller joins the handle.
pub async fn spawn_smtp_server(scripts: Vec<SessionScript>) -> (SocketAddr, JoinHandle<()>) {
    init_test_tracing();

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind mock SMTP listener");
    let addr = listener.local_addr().expect("mock listener addr");

    let handle = tokio::spawn(async move {
        for script in scripts {
            let (stream, _) = listener.accept().await.expect("accept SMTP connection");
            handle_session(stream, script).await;
        }
    });

    (addr, handle)
}

async fn handle_session(stream: TcpStream, script: SessionScript) {
    let mut framed = Framed::new(stream, LinesCodec::new());

    let Some(banner) = script.banner else {
        // Stay silent until the client gives up
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        return;
    };

    send_lines(&mut framed, banner).await;

    for (expected, response) in script.exchanges {
        let Some(line) = framed.next().await else {
            panic!("Client hung up while expecting '{expected}'");
        };
        let line = line.expect("read SMTP line");
        assert_eq!(&line, expected, "unexpected SMTP request");
        send_lines(&mut framed, response).await;
    }

    // Drain the courtesy QUIT (and anything else) until the client hangs up
    while let Some(line) = framed.next().await {
        let line = line.expect("read trailing SMTP line");
        assert_eq!(line, "QUIT", "unexpected request after script end");
    }
}

/// The codec only appends `\n`, so each line carries its own `\r`.
async fn send_lines(framed: &mut Framed<TcpStream, LinesCodec>, response: &str) {
    for line in response.split('\n') {
        framed
            .send(format!("{}\r", line.trim_end_matches('\r')))
            .await
            .expect("send SMTP line");
    }
}

/// DNS stub resolving every domain to a fixed MX list.
pub struct StaticMxDns {
    pub hosts: Vec<MxHost>,
}

impl StaticMxDns {
    pub fn single(exchange: &str) -> Self {
        Self {
            hosts: vec![MxHost {
                exchange: exchange.to_string(),
                priority: 10,
            }],
        }
    }
}

#[async_trait]
impl DnsClient for StaticMxDns {
    async fn resolve_mx(&self, _domain: &str) -> Result<Vec<MxHost>, DnsLookupError> {
        Ok(self.hosts.clone())
    }

    async fn resolve_a(&self, _domain: &str) -> Result<bool, DnsLookupError> {
        Ok(true)
    }

    async fn resolve_aaaa(&self, _domain: &str) -> Result<bool, DnsLookupError> {
        Ok(false)
    }
}
