//! Liaison Health - Suppression, Liveness Probing and Membership
//!
//! Keeps a live view of which agents exist and are reachable, without
//! oscillating on flapping peers.
//!
//! - [`SuppressionStore`]: "ignore until" timestamps shared by the
//!   reconciler and delivery tasks
//! - [`Prober`]: one bounded-deadline ping, classified as a [`ProbeOutcome`]
//! - [`Reconciler`]: directory reconciliation plus periodic probe sweeps,
//!   publishing [`MembershipEvent`]s
//! - [`answer_ping`] / [`spawn_responder`]: the other side of a probe

pub mod error;
pub mod prober;
pub mod reconciler;
pub mod record;
pub mod responder;
pub mod suppression;

pub use error::{Error, Result};
pub use prober::{ProbeOutcome, Prober};
pub use reconciler::{
    ReconcileReport, Reconciler, ReconcilerConfig, ReconcilerTasks, SweepReport, RESERVED_PREFIXES,
};
pub use record::{AgentRecord, MembershipEvent, RemovalReason};
pub use responder::{answer_ping, spawn_responder};
pub use suppression::SuppressionStore;
