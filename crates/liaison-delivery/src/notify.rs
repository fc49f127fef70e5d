//! Notification Sink Adapter.
//!
//! Pushes human-readable outcomes to the front end: one newline-terminated
//! UTF-8 line per connection, then close. Best-effort: failures are logged
//! and dropped, never retried.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default sink host when `FRONT_HOST` is unset.
pub const DEFAULT_FRONT_HOST: &str = "127.0.0.1";

/// Default sink port when `FRONT_PORT` is unset or malformed.
pub const DEFAULT_FRONT_PORT: u16 = 5002;

const SINK_TIMEOUT: Duration = Duration::from_secs(2);

/// Destination for terminal outcomes and answers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Never fails from the caller's point of view.
    async fn notify(&self, message: &str);
}

/// Where a [`LineNotifier`] connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// `FRONT_HOST`/`FRONT_PORT`, read on every notification.
    Env,
    /// A fixed `host:port`.
    Fixed(String),
}

/// Writes each message as one line over a fresh TCP connection.
#[derive(Debug, Clone)]
pub struct LineNotifier {
    target: SinkTarget,
}

impl LineNotifier {
    /// Sink address taken from the environment at call time.
    pub fn from_env() -> Self {
        Self {
            target: SinkTarget::Env,
        }
    }

    /// Sink at a fixed address.
    pub fn to(addr: impl Into<String>) -> Self {
        Self {
            target: SinkTarget::Fixed(addr.into()),
        }
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    /// Address the next notification will go to.
    pub fn resolve(&self) -> String {
        match &self.target {
            SinkTarget::Env => env_sink_addr(),
            SinkTarget::Fixed(addr) => addr.clone(),
        }
    }

    /// Send one line, reporting failures.
    pub async fn try_notify(&self, message: &str) -> Result<()> {
        let addr = self.resolve();
        let sink_err = |source: std::io::Error| Error::Sink {
            addr: addr.clone(),
            source,
        };

        let mut stream = tokio::time::timeout(SINK_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| sink_err(std::io::ErrorKind::TimedOut.into()))?
            .map_err(sink_err)?;

        let line = format!("{}\n", message.trim_end_matches(['\r', '\n']));
        stream.write_all(line.as_bytes()).await.map_err(sink_err)?;
        stream.shutdown().await.map_err(sink_err)?;
        debug!(sink = %addr, "Notification delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn notify(&self, message: &str) {
        if let Err(e) = self.try_notify(message).await {
            warn!("Notification dropped: {}", e);
        }
    }
}

/// Forwards notifications into a channel, for in-process consumers.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            debug!("Notification channel closed");
        }
    }
}

/// `FRONT_HOST:FRONT_PORT`, falling back to defaults for missing or
/// malformed values.
pub fn env_sink_addr() -> String {
    let host = std::env::var("FRONT_HOST")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_FRONT_HOST.to_string());
    let port = parse_port(std::env::var("FRONT_PORT").ok().as_deref());
    format!("{}:{}", host, port)
}

fn parse_port(raw: Option<&str>) -> u16 {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_FRONT_PORT,
        Some(value) => match value.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                warn!(value, "Malformed FRONT_PORT, using {}", DEFAULT_FRONT_PORT);
                DEFAULT_FRONT_PORT
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn port_falls_back_on_garbage() {
        assert_eq!(parse_port(None), 5002);
        assert_eq!(parse_port(Some("")), 5002);
        assert_eq!(parse_port(Some("abc")), 5002);
        assert_eq!(parse_port(Some("0")), 5002);
        assert_eq!(parse_port(Some("70000")), 5002);
        assert_eq!(parse_port(Some(" 6000 ")), 6000);
    }

    #[tokio::test]
    async fn writes_one_line_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        LineNotifier::to(addr)
            .try_notify("❌ Error: LogicAgent unavailable. Cannot complete the request.")
            .await
            .unwrap();

        assert_eq!(
            reader.await.unwrap(),
            "❌ Error: LogicAgent unavailable. Cannot complete the request.\n"
        );
    }

    #[tokio::test]
    async fn unreachable_sink_is_swallowed() {
        let vacant = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let notifier = LineNotifier::to(vacant.to_string());
        assert!(notifier.try_notify("hello").await.is_err());
        // The infallible entry point just logs.
        notifier.notify("hello").await;
    }

    #[tokio::test]
    async fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify("answer: yes").await;
        assert_eq!(rx.recv().await.as_deref(), Some("answer: yes"));
    }
}
