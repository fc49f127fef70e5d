//! Monitor node: reconciliation events reach the HTTP event sink.

use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use liaison_health::ReconcilerConfig;
use liaison_integration_tests::Mesh;
use liaison_node::{DfEvent, DfEventKind, MonitorSink, Role};
use liaison_protocols::{Directory, EndpointRef};
use tokio::sync::mpsc;

async fn event_receiver() -> (String, mpsc::UnboundedReceiver<DfEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route(
            "/df-event",
            post(
                |State(tx): State<mpsc::UnboundedSender<DfEvent>>, Json(event): Json<DfEvent>| async move {
                    let _ = tx.send(event);
                    "ok"
                },
            ),
        )
        .with_state(tx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/df-event", addr), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<DfEvent>) -> DfEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

/// Skip keep-alive registrations until an event of `kind` shows up.
async fn next_of_kind(rx: &mut mpsc::UnboundedReceiver<DfEvent>, kind: DfEventKind) -> DfEvent {
    loop {
        let event = next_event(rx).await;
        if event.kind == kind {
            return event;
        }
    }
}

#[tokio::test]
async fn joins_and_leaves_are_forwarded() {
    let mesh = Mesh::new();
    let (url, mut events) = event_receiver().await;

    let fast = ReconcilerConfig::default()
        .with_intervals(Duration::from_millis(50), Duration::from_millis(50))
        .with_probe_timeout(Duration::from_millis(200));
    let monitor = mesh
        .node(Role::Monitor, "monitor@liaison")
        .with_reconciler_config(fast)
        .with_monitor_sink(Some(MonitorSink::to(url)));
    let monitor = mesh.start(monitor).await;

    let logic = mesh.start(mesh.node(Role::Logic, "logic@liaison")).await;

    let joined = next_event(&mut events).await;
    assert_eq!(joined.kind, DfEventKind::Register);
    assert_eq!(joined.name, "logic@liaison");
    assert_eq!(joined.clazz, "logic");

    logic.stop().await.unwrap();

    let left = next_of_kind(&mut events, DfEventKind::Deregister).await;
    assert_eq!(left.name, "logic@liaison");

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn dead_registration_is_never_announced() {
    let mesh = Mesh::new();
    let (url, mut events) = event_receiver().await;

    // In the directory, but not on the bus at all.
    let ghost = EndpointRef::new("ghost@liaison", "local");
    mesh.directory.register(&ghost, "parser").await.unwrap();

    let fast = ReconcilerConfig::default()
        .with_intervals(Duration::from_millis(50), Duration::from_millis(50))
        .with_probe_timeout(Duration::from_millis(200));
    let monitor = mesh
        .node(Role::Monitor, "monitor@liaison")
        .with_reconciler_config(fast)
        .with_monitor_sink(Some(MonitorSink::to(url)));
    let monitor = mesh.start(monitor).await;
    let parser = mesh.start(mesh.node(Role::Parser, "parser@liaison")).await;

    let joined = next_event(&mut events).await;
    assert_eq!(joined.name, "parser@liaison");

    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(event) = events.try_recv() {
        assert_ne!(event.name, "ghost@liaison");
    }

    parser.stop().await.unwrap();
    monitor.stop().await.unwrap();
}
