//! HTTP surface of the coordinator.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::client::{PEER_GENESIS_PATH, PEER_INFO_PATH};
use crate::genesis::GenesisDocument;
use crate::hub::{HubHandle, HubOutcome, HubPhase};
use crate::manager::QuorumProgress;
use crate::models::ParticipantInfo;
use crate::ws::{ws_enroll_handler, ENROLL_PATH};

/// Shared by every request handler.
pub struct CoordinatorState {
    pub hub: HubHandle,
    pub progress: watch::Receiver<QuorumProgress>,
    /// The coordinator's own record when it takes part in the round
    pub identity: Option<ParticipantInfo>,
}

pub type AppState = Arc<CoordinatorState>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/genesis", get(genesis))
        .route("/nodes", get(nodes))
        .route("/infos", get(infos))
        .route(PEER_INFO_PATH, get(infos))
        .route(PEER_GENESIS_PATH, get(genesis))
        .route(ENROLL_PATH, get(ws_enroll_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    phase: HubPhase,
    sessions: Option<usize>,
    target: usize,
    validators_enrolled: usize,
    nodes_enrolled: usize,
    fingerprint: Option<String>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let hub = state.hub.status().await.ok();
    let progress = state.progress.borrow().clone();

    let phase = match (&hub, progress.outcome) {
        (Some(hub), _) => hub.phase,
        (None, Some(HubOutcome::Completed)) => HubPhase::Completed,
        (None, _) => HubPhase::Abandoned,
    };

    Json(StatusResponse {
        phase,
        sessions: hub.map(|h| h.sessions),
        target: progress.target,
        validators_enrolled: progress.validators.len(),
        nodes_enrolled: progress.nodes.len(),
        fingerprint: progress.fingerprint,
    })
}

async fn genesis(State(state): State<AppState>) -> Result<Json<GenesisDocument>, StatusCode> {
    let genesis = state.progress.borrow().genesis.clone();
    genesis.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn nodes(State(state): State<AppState>) -> Json<Vec<ParticipantInfo>> {
    let nodes = state.progress.borrow().nodes.clone();
    Json(nodes)
}

async fn infos(State(state): State<AppState>) -> Result<Json<ParticipantInfo>, StatusCode> {
    state.identity.clone().map(Json).ok_or(StatusCode::NOT_FOUND)
}
