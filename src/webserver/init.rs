// Lifecycle endpoints: `/init` brings up the coordinator (store subprocess,
// store client, keyword index, embedding/reranking providers), `/ping` is a
// liveness probe usable before or after init, `/shutdown` tears the
// coordinator down gracefully. Grounded on the teacher's `bin/webserver.rs`
// main()/run() split, generalized from eager to lazy initialization since
// this crate's `/init` accepts a client-supplied configuration bootstrap
// instead of reading one fixed `Configuration` at process start.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::ConfigurationBootstrap;
use crate::coordinator::Coordinator;
use crate::error::Result;

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct InitRequest {
    #[serde(default)]
    pub bootstrap: ConfigurationBootstrap,
}

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub initialized: bool,
    pub index_dir: String,
}

/// Idempotent: a second call with the coordinator already set tears down the
/// old one first so a changed bootstrap (e.g. a new embedding endpoint) takes
/// effect, rather than silently keeping the first call's providers.
pub async fn init(State(state): State<Arc<AppState>>, body: Option<Json<InitRequest>>) -> Result<Json<InitResponse>> {
    let InitRequest { bootstrap } = body.map(|Json(b)| b).unwrap_or_default();

    let mut config = (*state.base_config).clone();
    config.merge_bootstrap(bootstrap);
    let config = Arc::new(config);

    if let Some(previous) = state.coordinator.load_full() {
        previous.shutdown().await;
    }

    let coordinator = Coordinator::initialize(config.clone()).await?;
    state.coordinator.store(Some(coordinator));

    Ok(Json(InitResponse { initialized: true, index_dir: config.index_dir.display().to_string() }))
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub initialized: bool,
    pub store_live: bool,
}

pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    match state.coordinator.load_full() {
        Some(coordinator) => Json(PingResponse { initialized: true, store_live: coordinator.store_client.is_live() }),
        None => Json(PingResponse { initialized: false, store_live: false }),
    }
}

pub async fn shutdown(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if let Some(coordinator) = state.coordinator.load_full() {
        coordinator.shutdown().await;
        state.coordinator.store(None);
    }
    Json(serde_json::json!({ "shutdown": true }))
}
