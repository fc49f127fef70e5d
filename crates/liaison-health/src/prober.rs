//! Liveness Prober.
//!
//! Sends a `REQUEST "ping"` with an explicit reply deadline and classifies
//! the result. Retry policy is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use liaison_protocols::{EndpointRef, Envelope, Performative, Transport};
use serde::Serialize;
use tracing::{debug, trace};

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeOutcome {
    /// Affirmative reply before the deadline.
    Alive,
    /// Refusal, failure reply, or no route to the endpoint.
    Unreachable,
    /// Nothing came back before the deadline.
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_alive(self) -> bool {
        self == Self::Alive
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alive => write!(f, "Alive"),
            Self::Unreachable => write!(f, "Unreachable"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Issues liveness probes from one local endpoint.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Endpoint the probes are sent from.
    pub fn local(&self) -> &EndpointRef {
        self.transport.local()
    }

    /// Probe `endpoint`, waiting at most `timeout` for an answer.
    pub async fn probe(&self, endpoint: &EndpointRef, timeout: Duration) -> ProbeOutcome {
        let ping = Envelope::ping(self.transport.local().clone(), endpoint.clone(), timeout);
        let outcome = match self.transport.request(ping, timeout).await {
            Ok(Some(reply)) => match reply.performative {
                Performative::Inform => ProbeOutcome::Alive,
                other => {
                    debug!(endpoint = %endpoint, performative = %other, "Probe answered negatively");
                    ProbeOutcome::Unreachable
                }
            },
            Ok(None) => ProbeOutcome::TimedOut,
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Probe could not be sent");
                ProbeOutcome::Unreachable
            }
        };
        trace!(endpoint = %endpoint, outcome = %outcome, "Probe finished");
        outcome
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("local", self.transport.local())
            .finish()
    }
}
