// MCP proxy stub: tracks which MCP servers are known and enabled so the
// client's server-management UI has something to read/write, without this
// core actually spawning or proxying an MCP server process (the real
// `McpService` is an external collaborator per SPEC_FULL's Non-goals).
// Grounded on the original `app/routes/mcp.py` for the route/response shape;
// `sync_servers` here just seeds the registry from the request body instead
// of discovering servers from a config file.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncServersRequest {
    pub server_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncServersResponse {
    pub success: bool,
}

pub async fn sync_servers(State(state): State<Arc<AppState>>, Json(request): Json<SyncServersRequest>) -> Json<SyncServersResponse> {
    let mut servers = state.mcp_servers.write().await;
    for name in request.server_names {
        servers.entry(name).or_insert(true);
    }
    Json(SyncServersResponse { success: true })
}

#[derive(Debug, Deserialize)]
pub struct ListServersQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct McpServer {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ListServersResponse {
    pub servers: Vec<McpServer>,
}

pub async fn list_servers(State(state): State<Arc<AppState>>, Query(query): Query<ListServersQuery>) -> Json<ListServersResponse> {
    let guard = state.mcp_servers.read().await;
    let mut servers: Vec<McpServer> = guard.iter().map(|(name, enabled)| McpServer { name: name.clone(), enabled: *enabled }).collect();
    servers.sort_by(|a, b| a.name.cmp(&b.name));
    let servers = servers.into_iter().skip(query.offset).take(query.limit).collect();
    Json(ListServersResponse { servers })
}

#[derive(Debug, Serialize)]
pub struct ServerActionResponse {
    pub message: String,
}

pub async fn enable_server(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Json<ServerActionResponse> {
    set_enabled(&state, &name, true).await;
    Json(ServerActionResponse { message: format!("{name} enabled") })
}

pub async fn disable_server(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Json<ServerActionResponse> {
    set_enabled(&state, &name, false).await;
    Json(ServerActionResponse { message: format!("{name} disabled") })
}

async fn set_enabled(state: &AppState, name: &str, enabled: bool) {
    state.mcp_servers.write().await.insert(name.to_owned(), enabled);
}
