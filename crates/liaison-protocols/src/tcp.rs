//! Line-delimited JSON transport over TCP.
//!
//! Every agent listens on its endpoint address. Sending opens a short-lived
//! connection per receiver, writes one JSON envelope terminated by `\n` and
//! closes. Replies come back the same way to the requester's own listener
//! and are matched to the outstanding request by `in_reply_to`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::envelope::{EndpointRef, Envelope};
use crate::error::{Error, Result};
use crate::transport::{Mailbox, MailboxSender, ReplyRouter, Transport};

/// Upper bound on establishing an outbound connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP transport bound to one local endpoint.
#[derive(Debug)]
pub struct TcpTransport {
    local: EndpointRef,
    replies: Arc<ReplyRouter>,
    listener_task: JoinHandle<()>,
}

impl TcpTransport {
    /// Bind a listener on `listen_addr` and start accepting envelopes.
    ///
    /// The returned transport's endpoint carries the actually bound address,
    /// so binding port 0 is fine.
    pub async fn bind(name: &str, listen_addr: &str) -> Result<(Arc<Self>, Mailbox)> {
        let listener = TcpListener::bind(listen_addr).await?;
        let bound = listener.local_addr()?;
        let local = EndpointRef::new(name, bound.to_string());
        info!(endpoint = %local, addr = %bound, "Envelope listener started");

        let (inbox, mailbox) = Mailbox::channel();
        let replies = Arc::new(ReplyRouter::new());
        let listener_task = tokio::spawn(accept_loop(listener, inbox, Arc::clone(&replies)));

        Ok((
            Arc::new(Self {
                local,
                replies,
                listener_task,
            }),
            mailbox,
        ))
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> &str {
        self.local.addr()
    }

    async fn deliver(&self, receiver: &EndpointRef, line: &str) -> Result<()> {
        let connect = TcpStream::connect(receiver.addr());
        let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(receiver = %receiver, error = %e, "Connect failed");
                return Err(Error::Unreachable(receiver.name().to_string()));
            }
            Err(_) => return Err(Error::Unreachable(receiver.name().to_string())),
        };

        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        stream
            .write_all(b"\n")
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        stream.shutdown().await.map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.listener_task.abort();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local(&self) -> &EndpointRef {
        &self.local
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        let line = envelope.to_line()?;
        let mut first_err = None;
        for receiver in &envelope.receivers {
            trace!(receiver = %receiver, performative = %envelope.performative, "TCP send");
            if let Err(e) = self.deliver(receiver, &line).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The deadline covers connecting and sending as well as the reply.
    async fn request(&self, envelope: Envelope, timeout: Duration) -> Result<Option<Envelope>> {
        let conversation_id = envelope.conversation_id.clone();
        let rx = self.replies.expect(&conversation_id);
        let exchange = async {
            self.send(envelope).await?;
            Ok::<_, Error>(rx.await.ok())
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(Some(reply))) => Ok(Some(reply)),
            Ok(Ok(None)) => {
                self.replies.forget(&conversation_id);
                Ok(None)
            }
            Ok(Err(e)) => {
                self.replies.forget(&conversation_id);
                Err(e)
            }
            Err(_) => {
                debug!(conversation = %conversation_id, ?timeout, "No reply before deadline");
                self.replies.forget(&conversation_id);
                Ok(None)
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, inbox: MailboxSender, replies: Arc<ReplyRouter>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let inbox = inbox.clone();
                let replies = Arc::clone(&replies);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, inbox, replies).await {
                        warn!("Envelope connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                warn!("Envelope accept error: {}", e);
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    inbox: MailboxSender,
    replies: Arc<ReplyRouter>,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        if !line.trim().is_empty() {
            match Envelope::from_line(&line) {
                Ok(envelope) => {
                    if let Some(envelope) = replies.route(envelope) {
                        if inbox.send(envelope).is_err() {
                            // Mailbox dropped: the agent is shutting down.
                            return Ok(());
                        }
                    }
                }
                Err(e) => warn!("Discarding malformed envelope from {}: {}", addr, e),
            }
        }
        line.clear();
    }

    Ok(())
}
