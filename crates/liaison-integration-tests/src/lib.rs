//! Shared fixtures for the cross-crate tests in `tests/`.

use std::sync::Arc;
use std::time::Duration;

use liaison_delivery::{ChannelNotifier, Notifier};
use liaison_node::{AgentNode, NodeConfig, Role};
use liaison_protocols::{Directory, EndpointRef, LocalBus, MemoryDirectory};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A set of in-process nodes sharing one bus and one directory.
pub struct Mesh {
    pub bus: Arc<LocalBus>,
    pub directory: Arc<MemoryDirectory>,
}

/// A node running in the background.
pub struct RunningNode {
    pub endpoint: EndpointRef,
    pub inputs: liaison_node::InputSender,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<liaison_node::Result<()>>,
}

impl RunningNode {
    /// Request shutdown and wait for deregistration.
    pub async fn stop(mut self) -> liaison_node::Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task
            .await
            .unwrap_or_else(|e| Err(liaison_node::Error::Collaborator(e.to_string())))
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            bus: LocalBus::new(),
            directory: MemoryDirectory::new(),
        }
    }

    /// Build a node of `role` named `name` on the bus, with intake and
    /// monitor forwarding switched off.
    pub fn node(&self, role: Role, name: &str) -> AgentNode {
        let config = NodeConfig::for_role(role)
            .with_name(name)
            .with_intake(None);
        let (transport, mailbox) = self.bus.attach(EndpointRef::new(name, "local"));
        let directory: Arc<dyn Directory> = self.directory.clone();
        AgentNode::new(config, transport, mailbox, directory).with_monitor_sink(None)
    }

    /// Spawn `node`, returning once it has registered.
    pub async fn start(&self, node: AgentNode) -> RunningNode {
        let endpoint = node.endpoint().clone();
        let inputs = node.inputs();
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(node.run_until(async move {
            let _ = stopped.await;
        }));
        self.wait_registered(&endpoint).await;
        RunningNode {
            endpoint,
            inputs,
            stop: Some(stop),
            task,
        }
    }

    /// Poll the directory until `endpoint` shows up.
    pub async fn wait_registered(&self, endpoint: &EndpointRef) {
        for _ in 0..200 {
            let records = self.directory.search(None).await.unwrap_or_default();
            if records.iter().any(|r| &r.endpoint == endpoint) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never registered", endpoint);
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier capturing every line.
pub fn capture() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<String>) {
    let (notifier, rx) = ChannelNotifier::new();
    (Arc::new(notifier), rx)
}
