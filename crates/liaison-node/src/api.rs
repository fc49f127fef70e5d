//! Status API of a monitor node.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use liaison_health::{AgentRecord, Reconciler, SuppressionStore};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared with the handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub reconciler: Arc<Reconciler>,
    pub suppression: Arc<SuppressionStore>,
}

/// Build the API router.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/api/v1/members", get(list_members))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct MemberView {
    name: String,
    addr: String,
    role: String,
    alive: bool,
    consecutive_failures: u32,
    last_seen_ms_ago: u64,
}

impl From<&AgentRecord> for MemberView {
    fn from(record: &AgentRecord) -> Self {
        Self {
            name: record.endpoint.name().to_string(),
            addr: record.endpoint.addr().to_string(),
            role: record.role.clone(),
            alive: record.alive,
            consecutive_failures: record.consecutive_failures,
            last_seen_ms_ago: record.last_seen.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
struct MembersResponse {
    members: Vec<MemberView>,
    suppressed: usize,
}

async fn list_members(State(state): State<ApiState>) -> Json<MembersResponse> {
    let mut members: Vec<MemberView> = state
        .reconciler
        .known()
        .iter()
        .map(MemberView::from)
        .collect();
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Json(MembersResponse {
        members,
        suppressed: state.suppression.len(),
    })
}
