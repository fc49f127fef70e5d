//! Agent node: one endpoint, one role.
//!
//! A node registers itself with the directory, answers liveness probes, and
//! runs its role:
//!
//! - `user` / `query`: intake lines are delivered to a `parser`
//! - `parser`: payloads from intake agents are translated, tagged and
//!   delivered to a `logic` agent
//! - `logic`: formulas are evaluated and the answer is pushed to the
//!   notification sink
//! - `monitor`: the membership reconciler runs and its events are forwarded
//!   to the monitor event sink
//!
//! On shutdown the node deregisters itself.

use std::future::Future;
use std::sync::Arc;

use liaison_delivery::{DeliveryConfig, DeliveryScheduler, LineNotifier, Notifier};
use liaison_health::{answer_ping, Prober, Reconciler, ReconcilerConfig, SuppressionStore};
use liaison_protocols::{
    Directory, DirectoryClient, EndpointRef, Envelope, Mailbox, RemoteDirectory, Selector,
    TcpTransport, Transport,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::api::{self, ApiState};
use crate::config::{NodeConfig, Role};
use crate::error::{Error, Result};
use crate::intake::{InputSender, IntakeListener};
use crate::monitor::MonitorSink;
use crate::payload::{self, PayloadKind};
use crate::roles::{EchoEvaluator, Evaluator, PassThroughTranslator, Translator};

/// A Liaison agent node.
pub struct AgentNode {
    config: NodeConfig,
    transport: Arc<dyn Transport>,
    mailbox: Mailbox,
    directory: DirectoryClient,
    suppression: Arc<SuppressionStore>,
    notifier: Arc<dyn Notifier>,
    translator: Arc<dyn Translator>,
    evaluator: Arc<dyn Evaluator>,
    monitor_sink: Option<MonitorSink>,
    reconciler_config: ReconcilerConfig,
    inputs_tx: InputSender,
    inputs_rx: mpsc::UnboundedReceiver<String>,
}

impl AgentNode {
    /// Create a node listening on TCP and using a remote directory.
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        let (transport, mailbox) = TcpTransport::bind(&config.name, &config.listen).await?;
        let directory = Arc::new(RemoteDirectory::new(config.directory.clone()));
        Ok(Self::new(config, transport, mailbox, directory))
    }

    /// Create a node on an existing transport and directory.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        mailbox: Mailbox,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let monitor_sink = (config.role == Role::Monitor).then(MonitorSink::from_env);
        Self {
            config,
            transport,
            mailbox,
            directory: DirectoryClient::new(directory),
            suppression: Arc::new(SuppressionStore::new()),
            notifier: Arc::new(LineNotifier::from_env()),
            translator: Arc::new(PassThroughTranslator),
            evaluator: Arc::new(EchoEvaluator),
            monitor_sink,
            reconciler_config: ReconcilerConfig::default(),
            inputs_tx,
            inputs_rx,
        }
    }

    /// Set the notification sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set the translation service used by parser nodes.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    /// Set the evaluation engine used by logic nodes.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Set or disable the monitor event sink.
    #[must_use]
    pub fn with_monitor_sink(mut self, sink: Option<MonitorSink>) -> Self {
        self.monitor_sink = sink;
        self
    }

    /// Set the reconciler policy used by monitor nodes.
    #[must_use]
    pub fn with_reconciler_config(mut self, config: ReconcilerConfig) -> Self {
        self.reconciler_config = config;
        self
    }

    /// Share a suppression store with other components.
    #[must_use]
    pub fn with_suppression(mut self, suppression: Arc<SuppressionStore>) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn endpoint(&self) -> &EndpointRef {
        self.transport.local()
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Channel accepting intake lines, as if read from the intake listener.
    pub fn inputs(&self) -> InputSender {
        self.inputs_tx.clone()
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes, then deregister.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let AgentNode {
            config,
            transport,
            mut mailbox,
            directory,
            suppression,
            notifier,
            translator,
            evaluator,
            monitor_sink,
            reconciler_config,
            inputs_tx,
            mut inputs_rx,
        } = self;
        let local = transport.local().clone();

        directory
            .directory()
            .register(&local, config.role.as_str())
            .await?;
        info!(endpoint = %local, role = %config.role, addr = local.addr(), "Agent registered");

        let scheduler = DeliveryScheduler::new(
            directory.clone(),
            Arc::clone(&transport),
            Arc::clone(&suppression),
            Arc::clone(&notifier),
        );
        let ctx = Arc::new(RoleContext {
            role: config.role,
            transport: Arc::clone(&transport),
            downstream: config.role.downstream(),
            scheduler,
            notifier,
            translator,
            evaluator,
        });

        let mut background = Vec::new();

        if config.role == Role::Monitor {
            let reconciler = Arc::new(Reconciler::new(
                reconciler_config,
                directory.clone(),
                Prober::new(Arc::clone(&transport)),
                Arc::clone(&suppression),
            ));
            if let Some(sink) = monitor_sink {
                background.push(sink.spawn_forwarder(reconciler.subscribe()));
            }
            if let Some(addr) = config.api {
                let app = api::build_router(ApiState {
                    reconciler: Arc::clone(&reconciler),
                    suppression: Arc::clone(&suppression),
                });
                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!("Status API listening on http://{}", addr);
                background.push(tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, app).await {
                        error!("Status API error: {}", e);
                    }
                }));
            }
            let tasks = reconciler.spawn();
            background.push(tasks.reconcile);
            background.push(tasks.sweep);
        }

        if let (Some((_, ack)), Some(addr)) = (config.role.intake(), config.intake.as_deref()) {
            let intake = IntakeListener::bind(addr, ack).await?;
            background.push(intake.spawn(inputs_tx.clone()));
        }
        drop(inputs_tx);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(endpoint = %local, "Shutdown requested");
                    break;
                }
                Some(envelope) = mailbox.recv() => ctx.dispatch(envelope),
                Some(line) = inputs_rx.recv() => ctx.accept_input(line),
                else => break,
            }
        }

        for task in &background {
            task.abort();
        }
        if let Err(e) = directory.directory().deregister(&local).await {
            warn!(endpoint = %local, "Deregistration failed: {}", e);
        } else {
            info!(endpoint = %local, "Agent deregistered");
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("endpoint", self.transport.local())
            .field("role", &self.config.role)
            .finish_non_exhaustive()
    }
}

/// What role handlers need while the node runs.
struct RoleContext {
    role: Role,
    transport: Arc<dyn Transport>,
    downstream: Option<(Role, DeliveryConfig)>,
    scheduler: DeliveryScheduler,
    notifier: Arc<dyn Notifier>,
    translator: Arc<dyn Translator>,
    evaluator: Arc<dyn Evaluator>,
}

impl RoleContext {
    /// Route one inbound envelope without blocking the receive loop.
    fn dispatch(self: &Arc<Self>, envelope: Envelope) {
        let ctx = Arc::clone(self);

        if envelope.is_ping() {
            tokio::spawn(async move {
                if let Err(e) = answer_ping(ctx.transport.as_ref(), &envelope).await {
                    debug!(to = %envelope.sender, "Failed to answer ping: {}", e);
                }
            });
            return;
        }

        if !Selector::payloads().matches(&envelope) {
            trace!(
                from = %envelope.sender,
                performative = %envelope.performative,
                "Ignoring envelope"
            );
            return;
        }

        tokio::spawn(async move {
            let from = envelope.sender.clone();
            let result = match ctx.role {
                Role::Parser => ctx.parse(envelope).await,
                Role::Logic => ctx.evaluate(envelope).await,
                other => {
                    debug!(role = %other, from = %from, "No payload handler for role");
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(from = %from, "Payload handling failed: {}", e);
            }
        });
    }

    /// Deliver an intake line downstream.
    fn accept_input(&self, line: String) {
        debug!(role = %self.role, "Intake line accepted");
        self.deliver(line);
    }

    fn deliver(&self, payload: String) {
        match &self.downstream {
            Some((target, config)) => {
                let handle = self
                    .scheduler
                    .submit(target.as_str(), payload, config.clone());
                trace!(target = %target, state = %handle.state(), "Delivery submitted");
            }
            None => debug!(role = %self.role, "Role has no downstream, payload dropped"),
        }
    }

    async fn parse(&self, envelope: Envelope) -> Result<()> {
        let Some(kind) = PayloadKind::from_sender(envelope.sender.local_name()) else {
            warn!(from = %envelope.sender, "Ignoring payload from unknown sender");
            return Ok(());
        };

        let formula = self
            .translator
            .translate(kind, &envelope.content)
            .await?;
        if formula.is_empty() {
            return Err(Error::Collaborator("translator returned nothing".into()));
        }
        let formula = match kind {
            PayloadKind::Query => payload::as_query(&formula),
            PayloadKind::Fact => formula,
        };

        debug!(kind = %kind, formula = %formula, "Forwarding formula");
        self.deliver(payload::tag(kind, &formula));
        Ok(())
    }

    async fn evaluate(&self, envelope: Envelope) -> Result<()> {
        let (kind, formula) = payload::untag(&envelope.content);
        let answer = self.evaluator.evaluate(kind, formula).await?;
        self.notifier.notify(&answer).await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
