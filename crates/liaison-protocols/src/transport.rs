//! Point-to-point transport abstraction.
//!
//! A [`Transport`] sends envelopes and runs request/reply exchanges with an
//! explicit deadline. Inbound envelopes are split in two on arrival:
//!
//! - replies to an outstanding request go straight to the waiting requester
//!   through the [`ReplyRouter`];
//! - everything else lands in the agent's [`Mailbox`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::envelope::{EndpointRef, Envelope, Selector};
use crate::error::Result;

/// Outbound side of the message substrate.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity envelopes are sent from.
    fn local(&self) -> &EndpointRef;

    /// Send an envelope to all of its receivers.
    async fn send(&self, envelope: Envelope) -> Result<()>;

    /// Send a request and wait up to `timeout` for the first reply to it.
    ///
    /// Returns `Ok(None)` when the deadline passes without a reply.
    async fn request(&self, envelope: Envelope, timeout: Duration) -> Result<Option<Envelope>>;
}

/// Routes replies to the requester waiting on them.
#[derive(Debug, Default)]
pub struct ReplyRouter {
    pending: DashMap<String, oneshot::Sender<Envelope>>,
}

impl ReplyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for a reply to `conversation_id`.
    pub fn expect(&self, conversation_id: &str) -> oneshot::Receiver<Envelope> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(conversation_id.to_string(), tx);
        rx
    }

    /// Stop waiting for a reply to `conversation_id`.
    pub fn forget(&self, conversation_id: &str) {
        self.pending.remove(conversation_id);
    }

    /// Hand `envelope` to its waiting requester.
    ///
    /// Returns the envelope back if nobody is waiting for it.
    pub fn route(&self, envelope: Envelope) -> Option<Envelope> {
        let Some(reply_to) = envelope.in_reply_to.as_deref() else {
            return Some(envelope);
        };
        match self.pending.remove(reply_to) {
            Some((_, tx)) => {
                trace!(conversation = reply_to, "Routing reply to requester");
                // Requester may have given up already; the reply is then dropped.
                let _ = tx.send(envelope);
                None
            }
            None => Some(envelope),
        }
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for a reply registered with [`expect`](Self::expect), up to `timeout`.
    pub async fn wait(
        &self,
        conversation_id: &str,
        rx: oneshot::Receiver<Envelope>,
        timeout: Duration,
    ) -> Option<Envelope> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(_)) | Err(_) => {
                debug!(conversation = conversation_id, ?timeout, "No reply before deadline");
                self.forget(conversation_id);
                None
            }
        }
    }
}

/// Sending half of a mailbox, held by whatever delivers inbound envelopes.
pub type MailboxSender = mpsc::UnboundedSender<Envelope>;

/// Inbound queue of an agent.
///
/// Receiving with a [`Selector`] leaves non-matching envelopes queued for
/// later receives.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
    held: VecDeque<Envelope>,
}

impl Mailbox {
    /// Create a mailbox and the sender that feeds it.
    pub fn channel() -> (MailboxSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                held: VecDeque::new(),
            },
        )
    }

    /// Wait for the next envelope of any kind.
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        if let Some(held) = self.held.pop_front() {
            return Some(held);
        }
        self.rx.recv().await
    }

    /// Wait for the next envelope matching `selector`.
    pub async fn recv_matching(&mut self, selector: &Selector) -> Option<Envelope> {
        if let Some(pos) = self.held.iter().position(|e| selector.matches(e)) {
            return self.held.remove(pos);
        }
        loop {
            let envelope = self.rx.recv().await?;
            if selector.matches(&envelope) {
                return Some(envelope);
            }
            self.held.push_back(envelope);
        }
    }

    /// Take a matching envelope if one is already queued.
    pub fn try_recv_matching(&mut self, selector: &Selector) -> Option<Envelope> {
        while let Ok(envelope) = self.rx.try_recv() {
            self.held.push_back(envelope);
        }
        let pos = self.held.iter().position(|e| selector.matches(e))?;
        self.held.remove(pos)
    }

    /// Number of envelopes held back by selective receives.
    pub fn held(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Performative, PONG};

    fn ep(name: &str) -> EndpointRef {
        EndpointRef::new(name, "local")
    }

    #[tokio::test]
    async fn selective_receive_keeps_other_envelopes() {
        let (tx, mut mailbox) = Mailbox::channel();
        tx.send(Envelope::request(ep("a"), ep("b"), "ping")).unwrap();
        tx.send(Envelope::inform(ep("a"), ep("b"), "fact(x).")).unwrap();

        let inform = mailbox
            .recv_matching(&Selector::performative(Performative::Inform))
            .await
            .unwrap();
        assert_eq!(inform.content, "fact(x).");
        assert_eq!(mailbox.held(), 1);

        let request = mailbox.recv().await.unwrap();
        assert!(request.is_ping());
    }

    #[tokio::test]
    async fn try_recv_matching_does_not_block() {
        let (_tx, mut mailbox) = Mailbox::channel();
        assert!(mailbox.try_recv_matching(&Selector::Any).is_none());
    }

    #[tokio::test]
    async fn reply_is_routed_to_waiting_requester() {
        let router = ReplyRouter::new();
        let ping = Envelope::request(ep("a"), ep("b"), "ping");
        let rx = router.expect(&ping.conversation_id);

        let pong = ping.create_reply(ep("b"), Performative::Inform, PONG);
        assert!(router.route(pong.clone()).is_none());

        let got = router
            .wait(&ping.conversation_id, rx, Duration::from_millis(100))
            .await;
        assert_eq!(got, Some(pong));
        assert_eq!(router.pending(), 0);
    }

    #[tokio::test]
    async fn unsolicited_envelopes_pass_through_router() {
        let router = ReplyRouter::new();
        let inform = Envelope::inform(ep("a"), ep("b"), "hello");
        assert_eq!(router.route(inform.clone()), Some(inform));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_gives_up_at_deadline() {
        let router = ReplyRouter::new();
        let rx = router.expect("conv-1");
        let got = router.wait("conv-1", rx, Duration::from_millis(1800)).await;
        assert!(got.is_none());
        assert_eq!(router.pending(), 0);
    }
}
