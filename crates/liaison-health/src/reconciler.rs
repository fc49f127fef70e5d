//! Membership Reconciler.
//!
//! Maintains the set of endpoints known to be alive, driven by two
//! independent periodic triggers:
//!
//! - **Reconciliation tick**: scan the directory, probe newly sighted
//!   endpoints before admitting them, refresh known ones, and evict known
//!   endpoints the directory no longer lists.
//! - **Probe sweep**: probe every known endpoint; reset the failure streak on
//!   success, evict and suppress after `failure_threshold` consecutive
//!   failures.
//!
//! Membership changes are published as [`MembershipEvent`]s on a broadcast
//! channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use liaison_protocols::{DirectoryClient, EndpointRef, ServiceRecord};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::prober::{ProbeOutcome, Prober};
use crate::record::{AgentRecord, MembershipEvent, RemovalReason};
use crate::suppression::SuppressionStore;

/// Name prefixes of infrastructure endpoints that are never tracked.
pub const RESERVED_PREFIXES: [&str; 4] = ["ams@", "df@", "rma@", "monitor@"];

/// Configuration for the membership reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Period of the directory reconciliation tick.
    pub reconcile_interval: Duration,

    /// Period of the liveness probe sweep.
    pub sweep_interval: Duration,

    /// Reply deadline for admission and sweep probes.
    pub probe_timeout: Duration,

    /// Consecutive sweep failures that evict a known endpoint.
    pub failure_threshold: u32,

    /// Cooldown applied after a failed admission or an eviction by failures.
    pub suppression_ttl: Duration,

    /// Endpoint name prefixes to ignore.
    pub reserved_prefixes: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_millis(10_000),
            sweep_interval: Duration::from_millis(10_000),
            probe_timeout: Duration::from_millis(4_000),
            failure_threshold: 3,
            suppression_ttl: Duration::from_millis(60_000),
            reserved_prefixes: RESERVED_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ReconcilerConfig {
    /// Set both periodic trigger intervals.
    #[must_use]
    pub fn with_intervals(mut self, reconcile: Duration, sweep: Duration) -> Self {
        self.reconcile_interval = reconcile;
        self.sweep_interval = sweep;
        self
    }

    /// Set the probe reply deadline.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the consecutive failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the suppression cooldown.
    #[must_use]
    pub fn with_suppression_ttl(mut self, ttl: Duration) -> Self {
        self.suppression_ttl = ttl;
        self
    }

    /// Replace the reserved name prefixes.
    #[must_use]
    pub fn with_reserved_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

/// What one reconciliation tick did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Newly sighted endpoints that passed their admission probe.
    pub admitted: Vec<EndpointRef>,
    /// Newly sighted endpoints that failed their admission probe.
    pub rejected: Vec<EndpointRef>,
    /// Known endpoints no longer listed by the directory.
    pub evicted: Vec<EndpointRef>,
    /// Known endpoints whose `last_seen` was refreshed.
    pub refreshed: usize,
    /// Listed endpoints skipped because they are suppressed.
    pub suppressed: usize,
}

/// What one probe sweep did.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub alive: usize,
    pub failed: Vec<(EndpointRef, ProbeOutcome)>,
    /// Endpoints that reached the failure threshold.
    pub evicted: Vec<EndpointRef>,
}

/// Handles of the two periodic reconciler tasks.
#[derive(Debug)]
pub struct ReconcilerTasks {
    pub reconcile: JoinHandle<()>,
    pub sweep: JoinHandle<()>,
}

impl ReconcilerTasks {
    /// Stop both triggers.
    pub fn abort(&self) {
        self.reconcile.abort();
        self.sweep.abort();
    }
}

/// Keeps the live view of the mesh.
pub struct Reconciler {
    config: ReconcilerConfig,
    directory: DirectoryClient,
    prober: Prober,
    suppression: Arc<SuppressionStore>,
    known: DashMap<String, AgentRecord>,
    /// Endpoints with an admission probe in flight.
    pending: DashSet<String>,
    events: broadcast::Sender<MembershipEvent>,
}

impl Reconciler {
    /// Create a reconciler. Probes are sent from the prober's local endpoint,
    /// which is also the identity excluded from tracking.
    pub fn new(
        config: ReconcilerConfig,
        directory: DirectoryClient,
        prober: Prober,
        suppression: Arc<SuppressionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            directory,
            prober,
            suppression,
            known: DashMap::new(),
            pending: DashSet::new(),
            events,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Subscribe to membership events.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the known set.
    pub fn known(&self) -> Vec<AgentRecord> {
        self.known.iter().map(|r| r.value().clone()).collect()
    }

    /// Current record of a known endpoint.
    pub fn record(&self, endpoint: &EndpointRef) -> Option<AgentRecord> {
        self.known.get(endpoint.name()).map(|r| r.value().clone())
    }

    pub fn is_known(&self, endpoint: &EndpointRef) -> bool {
        self.known.contains_key(endpoint.name())
    }

    /// Self and infrastructure endpoints are never tracked.
    fn is_ignored(&self, endpoint: &EndpointRef) -> bool {
        endpoint.name() == self.prober.local().name()
            || self
                .config
                .reserved_prefixes
                .iter()
                .any(|p| endpoint.name().starts_with(p.as_str()))
    }

    fn emit(&self, event: MembershipEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Run one reconciliation tick.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let listing = self.directory.scan().await.map_err(Error::Scan)?;
        let now = Instant::now();
        let mut report = ReconcileReport::default();

        let listed: HashSet<&str> = listing.iter().map(|r| r.endpoint.name()).collect();
        let absent: Vec<String> = self
            .known
            .iter()
            .filter(|r| !listed.contains(r.key().as_str()))
            .map(|r| r.key().clone())
            .collect();
        for name in absent {
            if let Some((_, record)) = self.known.remove(&name) {
                info!(endpoint = %record.endpoint, role = %record.role, "Endpoint left the directory");
                self.emit(MembershipEvent::deregistered(&record, RemovalReason::NotInDirectory));
                report.evicted.push(record.endpoint);
            }
        }

        let mut admissions = Vec::new();
        for entry in listing.iter().filter(|r| !self.is_ignored(&r.endpoint)) {
            if self.suppression.is_suppressed(&entry.endpoint, now) {
                report.suppressed += 1;
                continue;
            }
            if let Some(mut record) = self.known.get_mut(entry.endpoint.name()) {
                record.last_seen = now;
                record.role.clone_from(&entry.role);
                report.refreshed += 1;
                continue;
            }
            if self.pending.insert(entry.endpoint.name().to_string()) {
                admissions.push(self.admit(entry.clone()));
            }
        }

        for (endpoint, outcome) in join_all(admissions).await {
            if outcome.is_alive() {
                report.admitted.push(endpoint);
            } else {
                report.rejected.push(endpoint);
            }
        }

        debug!(
            listed = listing.len(),
            admitted = report.admitted.len(),
            rejected = report.rejected.len(),
            evicted = report.evicted.len(),
            "Reconciliation tick"
        );
        Ok(report)
    }

    /// Probe a newly sighted endpoint and admit it only if alive.
    async fn admit(&self, entry: ServiceRecord) -> (EndpointRef, ProbeOutcome) {
        let name = entry.endpoint.name().to_string();
        let outcome = self
            .prober
            .probe(&entry.endpoint, self.config.probe_timeout)
            .await;

        if outcome.is_alive() {
            let record = AgentRecord::admitted(entry.endpoint.clone(), entry.role);
            info!(endpoint = %record.endpoint, role = %record.role, "Endpoint admitted");
            self.emit(MembershipEvent::registered(&record));
            self.known.insert(name.clone(), record);
        } else {
            debug!(endpoint = %entry.endpoint, outcome = %outcome, "Admission probe failed");
            self.suppression
                .suppress_now(&entry.endpoint, self.config.suppression_ttl);
        }
        self.pending.remove(&name);
        (entry.endpoint, outcome)
    }

    /// Run one probe sweep over the known set.
    pub async fn sweep(&self) -> SweepReport {
        let targets: Vec<EndpointRef> = self.known.iter().map(|r| r.endpoint.clone()).collect();
        let timeout = self.config.probe_timeout;
        let results = join_all(targets.iter().map(|endpoint| async move {
            (endpoint, self.prober.probe(endpoint, timeout).await)
        }))
        .await;

        let mut report = SweepReport::default();
        for (endpoint, outcome) in results {
            self.apply_probe(endpoint, outcome, &mut report);
        }
        trace!(
            probed = targets.len(),
            alive = report.alive,
            evicted = report.evicted.len(),
            "Probe sweep"
        );
        report
    }

    fn apply_probe(&self, endpoint: &EndpointRef, outcome: ProbeOutcome, report: &mut SweepReport) {
        let evict = {
            // Evicted by a concurrent tick while the probe was out.
            let Some(mut record) = self.known.get_mut(endpoint.name()) else {
                return;
            };
            if outcome.is_alive() {
                record.mark_alive();
                self.emit(MembershipEvent::registered(&record));
                report.alive += 1;
                false
            } else {
                let streak = record.mark_failed();
                debug!(endpoint = %endpoint, outcome = %outcome, streak, "Sweep probe failed");
                report.failed.push((endpoint.clone(), outcome));
                streak >= self.config.failure_threshold
            }
        };

        if evict {
            if let Some((_, record)) = self.known.remove(endpoint.name()) {
                warn!(
                    endpoint = %record.endpoint,
                    failures = record.consecutive_failures,
                    "Evicting unresponsive endpoint"
                );
                self.suppression
                    .suppress_now(&record.endpoint, self.config.suppression_ttl);
                self.emit(MembershipEvent::deregistered(&record, RemovalReason::ProbeFailures));
                report.evicted.push(record.endpoint);
            }
        }
    }

    /// Start the reconciliation tick and the probe sweep.
    ///
    /// Both first fire one period after spawning.
    pub fn spawn(self: &Arc<Self>) -> ReconcilerTasks {
        let this = Arc::clone(self);
        let reconcile = tokio::spawn(async move {
            let period = this.config.reconcile_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = this.reconcile().await {
                    warn!("Reconciliation tick skipped: {}", e);
                }
            }
        });

        let this = Arc::clone(self);
        let sweep = tokio::spawn(async move {
            let period = this.config.sweep_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.sweep().await;
                let cleared = this.suppression.clear_expired();
                if cleared > 0 {
                    trace!(cleared, "Expired suppressions removed");
                }
            }
        });

        info!(
            reconcile_ms = self.config.reconcile_interval.as_millis() as u64,
            sweep_ms = self.config.sweep_interval.as_millis() as u64,
            "Membership reconciler started"
        );
        ReconcilerTasks { reconcile, sweep }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("local", self.prober.local())
            .field("known", &self.known.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::spawn_responder;
    use async_trait::async_trait;
    use liaison_protocols::{Directory, LocalBus, Mailbox, MemoryDirectory, Transport};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Directory that can be switched off.
    struct FlakyDirectory {
        inner: Arc<MemoryDirectory>,
        down: AtomicBool,
    }

    impl FlakyDirectory {
        fn check(&self) -> liaison_protocols::Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(liaison_protocols::Error::Directory("down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Directory for FlakyDirectory {
        async fn register(&self, endpoint: &EndpointRef, role: &str) -> liaison_protocols::Result<()> {
            self.check()?;
            self.inner.register(endpoint, role).await
        }

        async fn deregister(&self, endpoint: &EndpointRef) -> liaison_protocols::Result<()> {
            self.check()?;
            self.inner.deregister(endpoint).await
        }

        async fn search(&self, role: Option<&str>) -> liaison_protocols::Result<Vec<ServiceRecord>> {
            self.check()?;
            self.inner.search(role).await
        }
    }

    fn ep(name: &str) -> EndpointRef {
        EndpointRef::new(name, "local")
    }

    struct Mesh {
        bus: Arc<LocalBus>,
        directory: Arc<MemoryDirectory>,
        suppression: Arc<SuppressionStore>,
        reconciler: Arc<Reconciler>,
        _mailbox: Mailbox,
    }

    fn mesh(config: ReconcilerConfig) -> Mesh {
        let bus = LocalBus::new();
        let directory = MemoryDirectory::new();
        let suppression = Arc::new(SuppressionStore::new());
        let (me, mailbox) = bus.attach(ep("monitor@liaison"));
        let reconciler = Arc::new(Reconciler::new(
            config,
            DirectoryClient::new(directory.clone()),
            Prober::new(me),
            Arc::clone(&suppression),
        ));
        Mesh {
            bus,
            directory,
            suppression,
            reconciler,
            _mailbox: mailbox,
        }
    }

    /// Attach an endpoint that answers pings, register it, and count its pings.
    async fn live_agent(m: &Mesh, name: &str, role: &str) -> Arc<AtomicUsize> {
        let (transport, mut mailbox) = m.bus.attach(ep(name));
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pings);
        tokio::spawn(async move {
            while let Some(envelope) = mailbox.recv().await {
                if envelope.is_ping() {
                    counter.fetch_add(1, Ordering::SeqCst);
                    crate::responder::answer_ping(transport.as_ref(), &envelope)
                        .await
                        .unwrap();
                }
            }
        });
        m.directory.register(&ep(name), role).await.unwrap();
        pings
    }

    #[tokio::test]
    async fn new_endpoint_is_admitted_after_probe() {
        let m = mesh(ReconcilerConfig::default());
        let mut events = m.reconciler.subscribe();
        live_agent(&m, "parser@liaison", "parser").await;

        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.admitted, vec![ep("parser@liaison")]);
        assert!(m.reconciler.is_known(&ep("parser@liaison")));

        let event = events.recv().await.unwrap();
        assert!(event.is_registration());
        assert_eq!(event.role(), "parser");
    }

    #[tokio::test]
    async fn failed_scan_leaves_known_set_alone() {
        let m = mesh(ReconcilerConfig::default());
        live_agent(&m, "parser@liaison", "parser").await;

        let flaky = Arc::new(FlakyDirectory {
            inner: m.directory.clone(),
            down: AtomicBool::new(false),
        });
        let (me, _mailbox) = m.bus.attach(ep("monitor-2@liaison"));
        let reconciler = Reconciler::new(
            ReconcilerConfig::default(),
            DirectoryClient::new(flaky.clone()),
            Prober::new(me),
            Arc::clone(&m.suppression),
        );
        let report = tokio_test::assert_ok!(reconciler.reconcile().await);
        assert_eq!(report.admitted, vec![ep("parser@liaison")]);

        let mut events = reconciler.subscribe();
        flaky.down.store(true, Ordering::SeqCst);
        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, Error::Scan(_)));
        assert!(reconciler.is_known(&ep("parser@liaison")));
        assert_eq!(reconciler.known().len(), 1);
        assert!(events.try_recv().is_err(), "no eviction on a failed scan");
    }

    #[tokio::test]
    async fn repeated_sightings_probe_only_once() {
        let m = mesh(ReconcilerConfig::default());
        let pings = live_agent(&m, "parser@liaison", "parser").await;

        for _ in 0..3 {
            m.reconciler.reconcile().await.unwrap();
        }
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.refreshed, 1);
        assert!(report.admitted.is_empty());
    }

    #[tokio::test]
    async fn failed_admission_is_suppressed_not_admitted() {
        let m = mesh(ReconcilerConfig::default());
        // Registered but not attached: every probe is unreachable.
        m.directory.register(&ep("ghost@liaison"), "logic").await.unwrap();

        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.rejected, vec![ep("ghost@liaison")]);
        assert!(!m.reconciler.is_known(&ep("ghost@liaison")));
        assert!(m.suppression.is_suppressed_now(&ep("ghost@liaison")));

        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.suppressed, 1);
        assert!(report.rejected.is_empty());
    }

    #[tokio::test]
    async fn self_and_reserved_names_are_ignored() {
        let m = mesh(ReconcilerConfig::default());
        m.directory.register(&ep("monitor@liaison"), "monitor").await.unwrap();
        m.directory.register(&ep("df@platform"), "df").await.unwrap();
        m.directory.register(&ep("ams@platform"), "ams").await.unwrap();

        let report = m.reconciler.reconcile().await.unwrap();
        assert!(report.admitted.is_empty());
        assert!(report.rejected.is_empty());
        assert!(m.reconciler.known().is_empty());
        assert!(m.suppression.is_empty());
    }

    #[tokio::test]
    async fn failure_threshold_evicts_and_suppresses() {
        let m = mesh(ReconcilerConfig::default());
        let mut events = m.reconciler.subscribe();
        live_agent(&m, "logic@liaison", "logic").await;
        m.reconciler.reconcile().await.unwrap();
        let _ = events.recv().await.unwrap();

        m.bus.detach(&ep("logic@liaison"));

        for expected in 1..3 {
            let report = m.reconciler.sweep().await;
            assert!(report.evicted.is_empty());
            let record = m.reconciler.record(&ep("logic@liaison")).unwrap();
            assert_eq!(record.consecutive_failures, expected);
            assert!(!record.alive);
        }

        let report = m.reconciler.sweep().await;
        assert_eq!(report.evicted, vec![ep("logic@liaison")]);
        assert!(!m.reconciler.is_known(&ep("logic@liaison")));
        assert!(m.suppression.is_suppressed_now(&ep("logic@liaison")));

        match events.recv().await.unwrap() {
            MembershipEvent::Deregistered { reason, .. } => {
                assert_eq!(reason, RemovalReason::ProbeFailures)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn successful_sweep_resets_failures_and_keeps_alive() {
        let m = mesh(ReconcilerConfig::default());
        let (transport, mailbox) = m.bus.attach(ep("parser@liaison"));
        m.directory.register(&ep("parser@liaison"), "parser").await.unwrap();
        let responder = spawn_responder(transport.clone(), mailbox);
        m.reconciler.reconcile().await.unwrap();

        // Go silent for one sweep by detaching, then come back.
        responder.abort();
        m.bus.detach(transport.local());
        m.reconciler.sweep().await;
        assert_eq!(
            m.reconciler.record(&ep("parser@liaison")).unwrap().consecutive_failures,
            1
        );

        let (transport, mailbox) = m.bus.attach(ep("parser@liaison"));
        spawn_responder(transport, mailbox);
        let mut events = m.reconciler.subscribe();
        let report = m.reconciler.sweep().await;
        assert_eq!(report.alive, 1);
        assert_eq!(
            m.reconciler.record(&ep("parser@liaison")).unwrap().consecutive_failures,
            0
        );
        assert!(events.recv().await.unwrap().is_registration());
    }

    #[tokio::test]
    async fn directory_absence_evicts_regardless_of_failures() {
        let m = mesh(ReconcilerConfig::default());
        let mut events = m.reconciler.subscribe();
        live_agent(&m, "query@liaison", "query").await;
        m.reconciler.reconcile().await.unwrap();
        let _ = events.recv().await.unwrap();

        m.directory.deregister(&ep("query@liaison")).await.unwrap();
        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.evicted, vec![ep("query@liaison")]);
        assert!(!m.reconciler.is_known(&ep("query@liaison")));
        // Directory eviction does not suppress.
        assert!(!m.suppression.is_suppressed_now(&ep("query@liaison")));

        match events.recv().await.unwrap() {
            MembershipEvent::Deregistered { reason, .. } => {
                assert_eq!(reason, RemovalReason::NotInDirectory)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn directory_absence_wins_over_partial_failure_streak() {
        let m = mesh(ReconcilerConfig::default());
        live_agent(&m, "query@liaison", "query").await;
        m.reconciler.reconcile().await.unwrap();
        m.bus.detach(&ep("query@liaison"));
        m.reconciler.sweep().await;
        assert_eq!(
            m.reconciler.record(&ep("query@liaison")).unwrap().consecutive_failures,
            1
        );

        m.directory.deregister(&ep("query@liaison")).await.unwrap();
        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.evicted.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_endpoint_times_out_admission() {
        let m = mesh(ReconcilerConfig::default());
        let (_transport, _mailbox) = m.bus.attach(ep("logic@liaison"));
        m.directory.register(&ep("logic@liaison"), "logic").await.unwrap();

        let started = Instant::now();
        let report = m.reconciler.reconcile().await.unwrap();
        assert_eq!(report.rejected, vec![ep("logic@liaison")]);
        assert!(started.elapsed() >= Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loops_admit_after_first_period() {
        let m = mesh(ReconcilerConfig::default());
        live_agent(&m, "parser@liaison", "parser").await;
        let tasks = m.reconciler.spawn();

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(m.reconciler.known().is_empty());

        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert!(m.reconciler.is_known(&ep("parser@liaison")));
        tasks.abort();
    }

    #[test]
    fn default_policy() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.reconcile_interval, Duration::from_millis(10_000));
        assert_eq!(config.sweep_interval, Duration::from_millis(10_000));
        assert_eq!(config.probe_timeout, Duration::from_millis(4_000));
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.suppression_ttl, Duration::from_millis(60_000));
        assert!(config.reserved_prefixes.iter().any(|p| p == "df@"));
    }
}
