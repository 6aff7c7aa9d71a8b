// Auth token broker: a local-file-backed credential store under
// `config.index_dir`, standing in for the "CLI storage manager" variant the
// original `AuthTokenService.get_auth_token_storage_manager` names (the
// "extension" variant lives inside the IDE process and is out of scope
// here). Grounded on the original `app/services/auth_token_service.py` for
// the store/load/delete contract; the token itself is opaque to this core —
// no validation or refresh, just persistence.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct StoreTokenRequest {
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoadTokenResponse {
    pub message: &'static str,
    pub auth_token: Option<String>,
}

fn token_path(state: &AppState) -> std::path::PathBuf {
    let coordinator = state.coordinator.load_full();
    let index_dir = coordinator.map(|c| c.config.index_dir.clone()).unwrap_or_else(|| state.base_config.index_dir.clone());
    index_dir.join("auth_token")
}

pub async fn store_token(State(state): State<Arc<AppState>>, Json(request): Json<StoreTokenRequest>) -> Result<Json<TokenResponse>> {
    let path = token_path(&state);
    std::fs::create_dir_all(path.parent().expect("token path has a parent")).map_err(|e| Error::Internal(e.into()))?;
    std::fs::write(&path, request.auth_token).map_err(|e| Error::Internal(e.into()))?;
    Ok(Json(TokenResponse { message: "success" }))
}

pub async fn load_token(State(state): State<Arc<AppState>>) -> Json<LoadTokenResponse> {
    match std::fs::read_to_string(token_path(&state)) {
        Ok(token) => Json(LoadTokenResponse { message: "success", auth_token: Some(token) }),
        Err(_) => Json(LoadTokenResponse { message: "failed", auth_token: None }),
    }
}

pub async fn delete_token(State(state): State<Arc<AppState>>) -> Json<TokenResponse> {
    let _ = std::fs::remove_file(token_path(&state));
    Json(TokenResponse { message: "success" })
}
