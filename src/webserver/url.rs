// The auxiliary URL content index surface. Storage, lookup and the
// conditional-refetch decision live in `url_store::UrlStore`; actually
// fetching and converting a page to markdown is an external collaborator
// (the scraper), so `read_urls`/`save_url` here accept the already-converted
// content instead of a bare URL to crawl. Grounded on the original
// `app/routes/url.py` for the endpoint/param shapes, adapted to this
// crate's own endpoint names per SPEC_FULL §6.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::UrlContent;
use crate::url_store::{needs_refetch, UrlStore};

use super::AppState;

async fn open_store(state: &AppState) -> Result<UrlStore> {
    let index_dir = match state.coordinator.load_full() {
        Some(coordinator) => coordinator.config.sqlite_path(),
        None => state.base_config.sqlite_path(),
    };
    UrlStore::connect(&index_dir).await
}

#[derive(Debug, Deserialize)]
pub struct ReadUrlsRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadUrlsResponse {
    pub contents: Vec<UrlContent>,
}

/// Returns whatever is already cached for the requested URLs; a cache miss
/// is simply omitted from `contents` rather than triggering a synchronous
/// fetch (fetching is the scraper's job, invoked by the caller via
/// `save_url` once it has fresh content).
pub async fn read_urls(State(state): State<Arc<AppState>>, Json(request): Json<ReadUrlsRequest>) -> Result<Json<ReadUrlsResponse>> {
    let store = open_store(&state).await?;
    let mut contents = Vec::new();
    for url in request.urls {
        if let Some(content) = store.get(&url).await? {
            contents.push(content);
        }
    }
    Ok(Json(ReadUrlsResponse { contents }))
}

#[derive(Debug, Deserialize)]
pub struct SaveUrlRequest {
    pub url: String,
    pub display_name: String,
    pub markdown_content: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default = "default_backend_id")]
    pub backend_id: String,
}

fn default_backend_id() -> String {
    "scraper".to_owned()
}

/// Saves freshly-fetched content if it's actually new, per
/// [`needs_refetch`]; a re-save with matching validators is a no-op that
/// still returns the (unchanged) cached record.
pub async fn save_url(State(state): State<Arc<AppState>>, Json(request): Json<SaveUrlRequest>) -> Result<Json<UrlContent>> {
    let store = open_store(&state).await?;
    let existing = store.get(&request.url).await?;

    if !needs_refetch(existing.as_ref(), request.etag.as_deref(), request.last_modified.as_deref()) {
        return Ok(Json(existing.expect("needs_refetch false implies a cached record exists")));
    }

    let content = UrlContent {
        url: request.url,
        display_name: request.display_name,
        content_hash: blake3::hash(request.markdown_content.as_bytes()).to_hex().to_string(),
        markdown_content: request.markdown_content,
        etag: request.etag,
        last_modified: request.last_modified,
        last_indexed_unix_secs: crate::coordinator::manifest::now_unix_secs(),
        backend_id: request.backend_id,
    };
    store.save(&content).await?;
    Ok(Json(content))
}

#[derive(Debug, Deserialize)]
pub struct SearchUrlQuery {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn search_url(State(state): State<Arc<AppState>>, Query(query): Query<SearchUrlQuery>) -> Result<Json<Vec<UrlContent>>> {
    let store = open_store(&state).await?;
    Ok(Json(store.search(&query.query, query.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListSavedUrlsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list_saved_urls(State(state): State<Arc<AppState>>, Query(query): Query<ListSavedUrlsQuery>) -> Result<Json<Vec<UrlContent>>> {
    let store = open_store(&state).await?;
    Ok(Json(store.list(query.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteSavedUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteSavedUrlResponse {
    pub status: &'static str,
}

pub async fn delete_saved_url(State(state): State<Arc<AppState>>, Json(request): Json<DeleteSavedUrlRequest>) -> Result<Json<DeleteSavedUrlResponse>> {
    let store = open_store(&state).await?;
    if store.delete(&request.url).await? {
        Ok(Json(DeleteSavedUrlResponse { status: "deleted" }))
    } else {
        Err(Error::NotFound(format!("no saved url: {}", request.url)))
    }
}
