//! In-process message substrate.
//!
//! [`LocalBus`] connects agents living in the same process (tests, single
//! binary deployments). Each attached endpoint gets a [`LocalTransport`] for
//! sending and a [`Mailbox`] for receiving. Detaching an endpoint makes it
//! unreachable: sends to it fail with [`Error::Unreachable`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::envelope::{EndpointRef, Envelope};
use crate::error::{Error, Result};
use crate::transport::{Mailbox, MailboxSender, ReplyRouter, Transport};

/// Delivery point of one attached endpoint.
#[derive(Debug, Clone)]
struct Port {
    inbox: MailboxSender,
    replies: Arc<ReplyRouter>,
}

/// Shared in-process bus.
#[derive(Debug, Default)]
pub struct LocalBus {
    ports: DashMap<String, Port>,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach an endpoint, replacing any previous attachment with the same name.
    pub fn attach(self: &Arc<Self>, endpoint: EndpointRef) -> (Arc<LocalTransport>, Mailbox) {
        let (inbox, mailbox) = Mailbox::channel();
        let replies = Arc::new(ReplyRouter::new());
        self.ports.insert(
            endpoint.name().to_string(),
            Port {
                inbox,
                replies: Arc::clone(&replies),
            },
        );
        debug!(endpoint = %endpoint, "Attached to local bus");

        let transport = Arc::new(LocalTransport {
            bus: Arc::clone(self),
            local: endpoint,
            replies,
        });
        (transport, mailbox)
    }

    /// Detach an endpoint. Returns whether it was attached.
    pub fn detach(&self, endpoint: &EndpointRef) -> bool {
        let removed = self.ports.remove(endpoint.name()).is_some();
        if removed {
            debug!(endpoint = %endpoint, "Detached from local bus");
        }
        removed
    }

    /// Whether an endpoint is currently attached.
    pub fn is_attached(&self, endpoint: &EndpointRef) -> bool {
        self.ports.contains_key(endpoint.name())
    }

    fn deliver(&self, receiver: &EndpointRef, envelope: Envelope) -> Result<()> {
        // Clone the port out so no map guard is held while delivering.
        let port = self
            .ports
            .get(receiver.name())
            .map(|p| p.value().clone())
            .ok_or_else(|| Error::Unreachable(receiver.name().to_string()))?;

        let Some(envelope) = port.replies.route(envelope) else {
            return Ok(());
        };
        port.inbox
            .send(envelope)
            .map_err(|_| Error::Unreachable(receiver.name().to_string()))
    }
}

/// Sending handle of an endpoint attached to a [`LocalBus`].
#[derive(Debug)]
pub struct LocalTransport {
    bus: Arc<LocalBus>,
    local: EndpointRef,
    replies: Arc<ReplyRouter>,
}

#[async_trait]
impl Transport for LocalTransport {
    fn local(&self) -> &EndpointRef {
        &self.local
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        trace!(
            from = %self.local,
            performative = %envelope.performative,
            receivers = envelope.receivers.len(),
            "Local send"
        );
        let mut first_err = None;
        for receiver in &envelope.receivers {
            if let Err(e) = self.bus.deliver(receiver, envelope.clone()) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn request(&self, envelope: Envelope, timeout: Duration) -> Result<Option<Envelope>> {
        let conversation_id = envelope.conversation_id.clone();
        let rx = self.replies.expect(&conversation_id);
        if let Err(e) = self.send(envelope).await {
            self.replies.forget(&conversation_id);
            return Err(e);
        }
        Ok(self.replies.wait(&conversation_id, rx, timeout).await)
    }
}
