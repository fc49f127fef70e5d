//! Ping responder: every agent answers `REQUEST "ping"` with `INFORM "pong"`.

use std::sync::Arc;

use liaison_protocols::{Envelope, Mailbox, Performative, Selector, Transport, PONG};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;

/// Answer `envelope` if it is a ping. Returns whether it was one.
pub async fn answer_ping(transport: &dyn Transport, envelope: &Envelope) -> Result<bool> {
    if !envelope.is_ping() {
        return Ok(false);
    }
    trace!(from = %envelope.sender, "Answering ping");
    let pong = envelope.create_reply(transport.local().clone(), Performative::Inform, PONG);
    transport.send(pong).await?;
    Ok(true)
}

/// Drain `mailbox`, answering pings and discarding everything else.
///
/// For agents that only need to look alive.
pub fn spawn_responder(transport: Arc<dyn Transport>, mut mailbox: Mailbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = mailbox.recv_matching(&Selector::Any).await {
            match answer_ping(transport.as_ref(), &envelope).await {
                Ok(true) => {}
                Ok(false) => trace!(performative = %envelope.performative, "Responder ignoring envelope"),
                Err(e) => debug!(to = %envelope.sender, error = %e, "Failed to answer ping"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use liaison_protocols::{EndpointRef, LocalBus};
    use std::time::Duration;

    fn ep(name: &str) -> EndpointRef {
        EndpointRef::new(name, "local")
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let bus = LocalBus::new();
        let (me, _box) = bus.attach(ep("a"));
        let (peer, peer_box) = bus.attach(ep("b"));
        spawn_responder(peer, peer_box);

        let reply = me
            .request(Envelope::request(ep("a"), ep("b"), " Ping "), Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.is_pong());
    }

    #[tokio::test]
    async fn other_requests_are_not_answered() {
        let bus = LocalBus::new();
        let (me, _box) = bus.attach(ep("a"));
        let request = Envelope::request(ep("b"), ep("a"), "status");
        assert!(!answer_ping(me.as_ref(), &request).await.unwrap());
    }
}
