//! Intake listener for user-facing roles.
//!
//! The front end opens a TCP connection, writes one line, reads one
//! acknowledgement line and disconnects. Accepted lines are forwarded to the
//! node for delivery.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Sending half that intake lines are pushed into.
pub type InputSender = mpsc::UnboundedSender<String>;

/// Longest accepted intake line, newline included.
pub const MAX_LINE: u64 = 8 * 1024;

/// How long a client may take to send its line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP intake bound to one address.
pub struct IntakeListener {
    listener: TcpListener,
    ack: String,
    read_timeout: Duration,
}

impl IntakeListener {
    /// Bind the intake. Port 0 picks a free port.
    pub async fn bind(addr: &str, ack: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            ack: ack.into(),
            read_timeout: READ_TIMEOUT,
        })
    }

    /// Set how long a client may take to send its line.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Address the intake is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections in the background, forwarding lines to `inputs`.
    pub fn spawn(self, inputs: InputSender) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Ok(addr) = self.listener.local_addr() {
                info!("Intake listening on {}", addr);
            }
            loop {
                match self.listener.accept().await {
                    Ok((stream, addr)) => {
                        let inputs = inputs.clone();
                        let ack = self.ack.clone();
                        let read_timeout = self.read_timeout;
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, &ack, read_timeout, inputs).await
                            {
                                warn!("Intake connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept intake connection: {}", e);
                    }
                }
            }
        })
    }
}

async fn handle_connection(
    stream: TcpStream,
    ack: &str,
    read_timeout: Duration,
    inputs: InputSender,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader).take(MAX_LINE);
    let mut line = String::new();

    let read = match tokio::time::timeout(read_timeout, reader.read_line(&mut line)).await {
        Ok(read) => read?,
        Err(_) => {
            debug!(?read_timeout, "Intake client sent no line in time");
            return Ok(());
        }
    };
    if read == 0 {
        return Ok(());
    }
    if read as u64 >= MAX_LINE && !line.ends_with('\n') {
        warn!(limit = MAX_LINE, "Intake line too long, connection dropped");
        return Ok(());
    }

    let text = line.trim();
    if text.is_empty() {
        debug!("Ignoring empty intake line");
    } else if inputs.send(text.to_string()).is_err() {
        warn!("Node stopped, intake line dropped");
    }

    writer.write_all(format!("{}\n", ack).as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}
