// The external HTTP/WebSocket surface, per SPEC_FULL §6. One `AppState`
// holds the process-wide configuration and a lazily-initialized
// `Coordinator`; every handler below borrows it through `axum::extract::State`
// rather than `Extension`, since unlike the teacher's root `Application` this
// crate's coordinator doesn't exist until `POST /init` runs.
//
// Grounded on the teacher's `bin/webserver.rs` (router assembly, CorsLayer,
// CatchPanicLayer) for the router shape; individual handler modules below
// are grounded on their respective lower-level module per DESIGN.md.

pub mod auth;
pub mod diff;
pub mod indexing;
pub mod init;
pub mod lookup;
pub mod mcp;
pub mod retrieval;
pub mod review;
pub mod url;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::config::Configuration;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};

/// Process-wide state handed to every handler. `coordinator` starts empty;
/// `POST /init` is the only place that fills it in, matching SPEC_FULL §4.5's
/// lazy-initialization model (a client may probe `/ping` before indexing
/// anything).
pub struct AppState {
    pub base_config: Arc<Configuration>,
    pub coordinator: ArcSwapOption<Coordinator>,
    /// Enabled/disabled state for the MCP proxy stub (`mcp::sync_servers`
    /// populates it; real tool invocation is out of scope, see DESIGN.md).
    /// A plain `RwLock<HashMap>` rather than the coordinator's `scc::HashMap`
    /// since this registry is small and read/written far less often than the
    /// per-repo manifest cache `scc` is grounded on.
    pub mcp_servers: tokio::sync::RwLock<std::collections::HashMap<String, bool>>,
}

impl AppState {
    pub fn new(base_config: Arc<Configuration>) -> Self {
        Self { base_config, coordinator: ArcSwapOption::empty(), mcp_servers: tokio::sync::RwLock::new(std::collections::HashMap::new()) }
    }

    /// Returns the live coordinator, or a `ClientError` telling the caller to
    /// hit `/init` first. Every route below the init/ping/shutdown trio goes
    /// through this.
    pub fn coordinator(&self) -> Result<Arc<Coordinator>> {
        self.coordinator
            .load_full()
            .ok_or_else(|| Error::ClientError("daemon not initialized, call POST /init first".to_owned()))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(init::ping))
        .route("/init", post(init::init))
        .route("/shutdown", get(init::shutdown))
        .route("/v1/update_chunks", get(indexing::update_chunks))
        .route("/v1/relevant_chunks", get(retrieval::relevant_chunks))
        .route("/v1/get-focus-chunks", post(lookup::get_focus_chunks))
        .route("/v1/get-directory-structure", post(lookup::get_directory_structure))
        .route("/v1/get-files-in-dir", post(lookup::get_files_in_dir))
        .route("/v1/batch_chunks_search", post(lookup::batch_chunks_search))
        .route("/v1/get-focus-search-results", post(lookup::get_focus_search_results))
        .route("/v1/grep-search", post(lookup::grep_search))
        .route("/v1/iteratively-read-file", post(lookup::iteratively_read_file))
        .route("/v1/read-file-or-summary", post(lookup::read_file_or_summary))
        .route("/v1/diff-applicator/apply-diff", post(diff::apply_diff))
        .route("/v1/auth/store_token", post(auth::store_token))
        .route("/v1/auth/load_token", post(auth::load_token))
        .route("/v1/auth/delete_token", post(auth::delete_token))
        .route("/v1/mcp/servers/sync", post(mcp::sync_servers))
        .route("/v1/mcp/servers", get(mcp::list_servers))
        .route("/v1/mcp/servers/:name/enable", post(mcp::enable_server))
        .route("/v1/mcp/servers/:name/disable", post(mcp::disable_server))
        .route("/v1/read_urls", post(url::read_urls))
        .route("/v1/saved_url", post(url::save_url))
        .route("/v1/search_url", get(url::search_url))
        .route("/v1/saved_url/list", get(url::list_saved_urls))
        .route("/v1/saved_url/delete", post(url::delete_saved_url))
        .route("/v1/review/snapshot", post(review::take_snapshot))
        .route("/v1/review/changes", post(review::get_changes))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
