//! Delivery Scheduler.
//!
//! Each submitted payload gets its own task, driven by a fixed-interval retry
//! trigger until it is either sent to exactly one healthy endpoint of the
//! target role or runs out of attempts:
//!
//! ```text
//! Searching ──candidate──▶ Probing ──Alive──▶ Sending ──▶ Done
//!     ▲                       │
//!     └───── probe failed ────┘   (attempts ≥ max) ──▶ Failed ──▶ notify
//! ```
//!
//! A trigger that fires while the previous cycle is still in flight is
//! skipped, so a task never runs two cycles at once and sends at most once.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use liaison_health::{ProbeOutcome, Prober, SuppressionStore};
use liaison_protocols::{DirectoryClient, EndpointRef, Envelope, Transport};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::notify::Notifier;

/// Configuration of one delivery task.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Period of the retry trigger. The first trigger fires immediately.
    pub retry_interval: Duration,

    /// Reply deadline of the pre-send liveness probe.
    pub probe_timeout: Duration,

    /// Failed attempts before the task gives up.
    pub max_attempts: u32,

    /// Cooldown applied to a candidate that failed its probe.
    pub suppression_ttl: Duration,

    /// Whether a fresh probe must succeed before sending.
    pub probe_gate: bool,

    /// Line pushed to the notification sink when the task fails.
    pub failure_message: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(2_000),
            probe_timeout: Duration::from_millis(1_800),
            max_attempts: 5,
            suppression_ttl: Duration::from_millis(60_000),
            probe_gate: true,
            failure_message: "❌ Error: no agent available. The request was not processed."
                .to_string(),
        }
    }
}

impl DeliveryConfig {
    /// Set the failure notification text.
    #[must_use]
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Enable or disable the pre-send probe.
    #[must_use]
    pub fn with_probe_gate(mut self, enabled: bool) -> Self {
        self.probe_gate = enabled;
        self
    }

    /// Set the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the retry trigger period.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the pre-send probe deadline.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the probe-failure cooldown.
    #[must_use]
    pub fn with_suppression_ttl(mut self, ttl: Duration) -> Self {
        self.suppression_ttl = ttl;
        self
    }
}

/// Where a delivery task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeliveryState {
    Searching,
    Probing,
    Sending,
    Done,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Searching => write!(f, "Searching"),
            Self::Probing => write!(f, "Probing"),
            Self::Sending => write!(f, "Sending"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Live view of a delivery task.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryProgress {
    pub state: DeliveryState,
    pub attempts: u32,
    /// Every state entered so far, consecutive repeats collapsed.
    pub trail: Vec<DeliveryState>,
}

impl DeliveryProgress {
    fn new() -> Self {
        Self {
            state: DeliveryState::Searching,
            attempts: 0,
            trail: vec![DeliveryState::Searching],
        }
    }

    fn enter(&mut self, state: DeliveryState) {
        if self.state != state {
            self.state = state;
            self.trail.push(state);
        }
    }
}

/// How a delivery task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeliveryOutcome {
    /// Payload sent to this endpoint.
    Delivered(EndpointRef),
    /// Attempts exhausted; the failure message was pushed to the sink.
    Failed,
}

/// Final account of a delivery task.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub role: String,
    pub outcome: DeliveryOutcome,
    pub attempts: u32,
    pub trail: Vec<DeliveryState>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered(_))
    }
}

/// Handle to a running delivery task.
#[derive(Debug)]
pub struct DeliveryHandle {
    progress: watch::Receiver<DeliveryProgress>,
    task: JoinHandle<DeliveryReport>,
}

impl DeliveryHandle {
    /// Current state.
    pub fn state(&self) -> DeliveryState {
        self.progress.borrow().state
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> DeliveryProgress {
        self.progress.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<DeliveryProgress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to reach `Done` or `Failed`.
    pub async fn wait(self) -> Result<DeliveryReport> {
        self.task
            .await
            .map_err(|e| Error::TaskAborted(e.to_string()))
    }
}

/// Result of one Searching → Probing → Sending cycle.
#[derive(Debug)]
enum Cycle {
    Sent(EndpointRef),
    NoCandidate,
    ProbeFailed(EndpointRef, ProbeOutcome),
    SendFailed(EndpointRef, String),
    DirectoryError(String),
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent(to) => write!(f, "sent to {}", to),
            Self::NoCandidate => write!(f, "no eligible candidate"),
            Self::ProbeFailed(to, outcome) => write!(f, "probe of {} returned {}", to, outcome),
            Self::SendFailed(to, e) => write!(f, "send to {} failed: {}", to, e),
            Self::DirectoryError(e) => write!(f, "directory lookup failed: {}", e),
        }
    }
}

/// What woke the task loop.
enum Wake {
    Tick,
    Cycle(Cycle),
}

/// Collaborators shared by every delivery task.
struct Shared {
    directory: DirectoryClient,
    prober: Prober,
    transport: Arc<dyn Transport>,
    suppression: Arc<SuppressionStore>,
    notifier: Arc<dyn Notifier>,
}

/// One payload bound for one role.
struct Job {
    role: String,
    payload: String,
    config: DeliveryConfig,
}

/// Spawns and drives delivery tasks.
#[derive(Clone)]
pub struct DeliveryScheduler {
    shared: Arc<Shared>,
}

impl DeliveryScheduler {
    pub fn new(
        directory: DirectoryClient,
        transport: Arc<dyn Transport>,
        suppression: Arc<SuppressionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                directory,
                prober: Prober::new(Arc::clone(&transport)),
                transport,
                suppression,
                notifier,
            }),
        }
    }

    /// Endpoint payloads are sent from.
    pub fn local(&self) -> &EndpointRef {
        self.shared.transport.local()
    }

    /// Start delivering `payload` to one endpoint of `role`.
    pub fn submit(
        &self,
        role: impl Into<String>,
        payload: impl Into<String>,
        config: DeliveryConfig,
    ) -> DeliveryHandle {
        let job = Arc::new(Job {
            role: role.into(),
            payload: payload.into(),
            config,
        });
        let (progress_tx, progress) = watch::channel(DeliveryProgress::new());
        let task = tokio::spawn(run(Arc::clone(&self.shared), job, Arc::new(progress_tx)));
        DeliveryHandle { progress, task }
    }
}

impl std::fmt::Debug for DeliveryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryScheduler")
            .field("local", self.shared.transport.local())
            .finish()
    }
}

async fn run(
    shared: Arc<Shared>,
    job: Arc<Job>,
    progress: Arc<watch::Sender<DeliveryProgress>>,
) -> DeliveryReport {
    debug!(role = %job.role, probe_gate = job.config.probe_gate, "Delivery task started");

    let mut ticker = tokio::time::interval(job.config.retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: Option<BoxFuture<'static, Cycle>> = None;
    let mut attempts = 0u32;

    loop {
        let wake = tokio::select! {
            _ = ticker.tick() => Wake::Tick,
            result = async {
                match in_flight.as_mut() {
                    Some(cycle) => cycle.await,
                    None => std::future::pending().await,
                }
            }, if in_flight.is_some() => Wake::Cycle(result),
        };

        match wake {
            Wake::Tick if in_flight.is_some() => {
                trace!(role = %job.role, "Previous cycle still in flight, skipping trigger");
            }
            Wake::Tick => {
                in_flight = Some(Box::pin(cycle(
                    Arc::clone(&shared),
                    Arc::clone(&job),
                    Arc::clone(&progress),
                )));
            }
            Wake::Cycle(result) => {
                in_flight = None;

                if let Cycle::Sent(to) = result {
                    progress.send_modify(|p| p.enter(DeliveryState::Done));
                    info!(role = %job.role, to = %to, attempts, "Payload delivered");
                    return report(&job, &progress, DeliveryOutcome::Delivered(to));
                }

                attempts += 1;
                progress.send_modify(|p| p.attempts = attempts);
                debug!(role = %job.role, attempt = attempts, "Delivery attempt failed: {}", result);

                if attempts >= job.config.max_attempts {
                    progress.send_modify(|p| p.enter(DeliveryState::Failed));
                    warn!(role = %job.role, attempts, "Delivery failed, giving up");
                    shared.notifier.notify(&job.config.failure_message).await;
                    return report(&job, &progress, DeliveryOutcome::Failed);
                }
            }
        }
    }
}

/// One Searching → Probing → Sending pass.
async fn cycle(
    shared: Arc<Shared>,
    job: Arc<Job>,
    progress: Arc<watch::Sender<DeliveryProgress>>,
) -> Cycle {
    progress.send_modify(|p| p.enter(DeliveryState::Searching));

    let candidates = match shared.directory.lookup(&job.role).await {
        Ok(candidates) => candidates,
        Err(e) => return Cycle::DirectoryError(e.to_string()),
    };
    let now = Instant::now();
    let Some(candidate) = candidates
        .into_iter()
        .find(|c| !shared.suppression.is_suppressed(c, now))
    else {
        return Cycle::NoCandidate;
    };

    if job.config.probe_gate {
        progress.send_modify(|p| p.enter(DeliveryState::Probing));
        let outcome = shared
            .prober
            .probe(&candidate, job.config.probe_timeout)
            .await;
        if !outcome.is_alive() {
            shared
                .suppression
                .suppress_now(&candidate, job.config.suppression_ttl);
            progress.send_modify(|p| p.enter(DeliveryState::Searching));
            return Cycle::ProbeFailed(candidate, outcome);
        }
    }

    progress.send_modify(|p| p.enter(DeliveryState::Sending));
    let envelope = Envelope::inform(
        shared.transport.local().clone(),
        candidate.clone(),
        job.payload.as_str(),
    );
    match shared.transport.send(envelope).await {
        Ok(()) => Cycle::Sent(candidate),
        Err(e) => {
            if e.is_unreachable() {
                shared
                    .suppression
                    .suppress_now(&candidate, job.config.suppression_ttl);
            }
            progress.send_modify(|p| p.enter(DeliveryState::Searching));
            Cycle::SendFailed(candidate, e.to_string())
        }
    }
}

fn report(
    job: &Job,
    progress: &watch::Sender<DeliveryProgress>,
    outcome: DeliveryOutcome,
) -> DeliveryReport {
    let snapshot = progress.borrow();
    DeliveryReport {
        role: job.role.clone(),
        outcome,
        attempts: snapshot.attempts,
        trail: snapshot.trail.clone(),
    }
}
