//! Membership records and events.

use liaison_protocols::{now_millis, EndpointRef};
use serde::Serialize;
use tokio::time::Instant;

/// One currently-known endpoint.
///
/// Exists only after a successful admission probe and until eviction.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub endpoint: EndpointRef,
    /// Role the endpoint advertised when last seen in the directory.
    pub role: String,
    /// Last successful probe or directory sighting.
    pub last_seen: Instant,
    pub consecutive_failures: u32,
    pub alive: bool,
}

impl AgentRecord {
    /// Record for an endpoint that just passed its admission probe.
    pub fn admitted(endpoint: EndpointRef, role: impl Into<String>) -> Self {
        Self {
            endpoint,
            role: role.into(),
            last_seen: Instant::now(),
            consecutive_failures: 0,
            alive: true,
        }
    }

    pub(crate) fn mark_alive(&mut self) {
        self.consecutive_failures = 0;
        self.last_seen = Instant::now();
        self.alive = true;
    }

    /// Count a failed probe and return the new streak length.
    pub(crate) fn mark_failed(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.alive = false;
        self.consecutive_failures
    }
}

/// Why an endpoint left the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Missing from a directory scan.
    NotInDirectory,
    /// Reached the consecutive probe failure threshold.
    ProbeFailures,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInDirectory => write!(f, "not in directory"),
            Self::ProbeFailures => write!(f, "probe failures"),
        }
    }
}

/// Change in membership, broadcast to subscribers.
///
/// `Registered` is also re-emitted as a keep-alive after every successful
/// sweep probe, so consumers must treat it as idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipEvent {
    Registered {
        endpoint: EndpointRef,
        role: String,
        /// Unix millis.
        at: u64,
    },
    Deregistered {
        endpoint: EndpointRef,
        role: String,
        reason: RemovalReason,
        at: u64,
    },
}

impl MembershipEvent {
    pub fn registered(record: &AgentRecord) -> Self {
        Self::Registered {
            endpoint: record.endpoint.clone(),
            role: record.role.clone(),
            at: now_millis(),
        }
    }

    pub fn deregistered(record: &AgentRecord, reason: RemovalReason) -> Self {
        Self::Deregistered {
            endpoint: record.endpoint.clone(),
            role: record.role.clone(),
            reason,
            at: now_millis(),
        }
    }

    pub fn endpoint(&self) -> &EndpointRef {
        match self {
            Self::Registered { endpoint, .. } | Self::Deregistered { endpoint, .. } => endpoint,
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::Registered { role, .. } | Self::Deregistered { role, .. } => role,
        }
    }

    pub fn at(&self) -> u64 {
        match self {
            Self::Registered { at, .. } | Self::Deregistered { at, .. } => *at,
        }
    }

    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_streak_resets_on_success() {
        let mut record = AgentRecord::admitted(EndpointRef::new("p@mesh", "local"), "parser");
        assert_eq!(record.mark_failed(), 1);
        assert_eq!(record.mark_failed(), 2);
        assert!(!record.alive);
        record.mark_alive();
        assert_eq!(record.consecutive_failures, 0);
        assert!(record.alive);
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let record = AgentRecord::admitted(EndpointRef::new("p@mesh", "local"), "parser");
        let event = MembershipEvent::deregistered(&record, RemovalReason::ProbeFailures);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "deregistered");
        assert_eq!(json["reason"], "probe_failures");
        assert_eq!(event.role(), "parser");
        assert!(!event.is_registration());
    }
}
