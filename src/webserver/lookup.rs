// The supporting lookup surface: focus chunks, directory structure/listing,
// batch symbol/keyword search, grep, and the two file-reading endpoints.
// Each handler is a thin translation from request DTO to the corresponding
// function in `retrieval::{directory, grep, file_reader}` or `ChunkStore`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ChunkHash, ScoredChunk, SymbolKind};
use crate::retrieval::directory::{self, DirectoryNode};
use crate::retrieval::file_reader::{self, FileOrSummary, LineRangeResult};
use crate::retrieval::grep::{self, GrepMatch};
use crate::store::{to_scored_chunks, KeywordMode};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct FocusChunksRequest {
    pub repo_path: String,
    pub chunk_hashes: Vec<String>,
}

pub async fn get_focus_chunks(State(state): State<Arc<AppState>>, Json(request): Json<FocusChunksRequest>) -> Result<Json<Vec<ScoredChunk>>> {
    let coordinator = state.coordinator()?;
    let hashes: Vec<ChunkHash> = request.chunk_hashes.into_iter().map(ChunkHash).collect();
    let chunks = coordinator.store.resolve_chunks(&hashes).await?;
    let scored = to_scored_chunks(chunks.into_iter().map(|c| (c, 1.0)).collect());
    let _ = request.repo_path;
    Ok(Json(scored))
}

#[derive(Debug, Deserialize)]
pub struct DirectoryRequest {
    pub repo_path: String,
    #[serde(default)]
    pub subdirectory: String,
}

pub async fn get_directory_structure(State(state): State<Arc<AppState>>, Json(request): Json<DirectoryRequest>) -> Result<Json<DirectoryNode>> {
    let coordinator = state.coordinator()?;
    let root = PathBuf::from(&request.repo_path);
    let tree = directory::directory_structure(&root, &request.subdirectory, &coordinator.config)?;
    Ok(Json(tree))
}

pub async fn get_files_in_dir(State(state): State<Arc<AppState>>, Json(request): Json<DirectoryRequest>) -> Result<Json<Vec<String>>> {
    let coordinator = state.coordinator()?;
    let root = PathBuf::from(&request.repo_path);
    let entries = directory::files_in_dir(&root, &request.subdirectory, &coordinator.config)?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct BatchChunksSearchRequest {
    pub repo_path: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Exact,
    #[default]
    Fuzzy,
    Bm25,
}

impl From<SearchMode> for KeywordMode {
    fn from(mode: SearchMode) -> Self {
        match mode {
            SearchMode::Exact => KeywordMode::Exact,
            SearchMode::Fuzzy => KeywordMode::Fuzzy,
            SearchMode::Bm25 => KeywordMode::Bm25,
        }
    }
}

fn default_limit() -> usize {
    25
}

/// Runs one keyword search per requested term against a single repo,
/// resolving hits back to full chunks and keeping them grouped per term so
/// the caller can see which keyword a chunk matched.
pub async fn batch_chunks_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchChunksSearchRequest>,
) -> Result<Json<Vec<(String, Vec<ScoredChunk>)>>> {
    let coordinator = state.coordinator()?;
    let mut results = Vec::with_capacity(request.keywords.len());
    for keyword in request.keywords {
        let hits = coordinator
            .store
            .keyword_search(&request.repo_path, &keyword, request.mode.into(), request.limit)
            .await?;
        let hashes: Vec<ChunkHash> = hits.iter().map(|(hash, _)| hash.clone()).collect();
        let chunks = coordinator.store.resolve_chunks(&hashes).await?;
        let by_hash: std::collections::HashMap<ChunkHash, _> = chunks.into_iter().map(|c| (c.chunk_hash.clone(), c)).collect();
        let scored = to_scored_chunks(hits.into_iter().filter_map(|(hash, score)| by_hash.get(&hash).cloned().map(|c| (c, score))).collect());
        results.push((keyword, scored));
    }
    Ok(Json(results))
}

/// Wire fields are `keyword`/`type` verbatim (not `query`/`kind`) to match
/// the documented request shape; serde silently drops unknown keys, so a
/// mismatch here used to swallow callers' `type` filters entirely.
#[derive(Debug, Deserialize)]
pub struct FocusSearchRequest {
    pub repo_path: String,
    pub keyword: String,
    #[serde(default, rename = "type")]
    pub r#type: Option<SymbolKind>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct FocusSearchHit {
    pub value: String,
    #[serde(rename = "type")]
    pub r#type: SymbolKind,
    pub score: f32,
}

/// The symbol-autocomplete surface the IDE's "@-mention" focus picker uses:
/// fuzzy symbol-name search, optionally restricted to one symbol kind.
pub async fn get_focus_search_results(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FocusSearchRequest>,
) -> Result<Json<Vec<FocusSearchHit>>> {
    let coordinator = state.coordinator()?;
    let hits = coordinator
        .store
        .symbol_search(&request.repo_path, &request.keyword, request.r#type, request.limit)
        .await?;
    Ok(Json(hits.into_iter().map(|(value, kind, score)| FocusSearchHit { value, r#type: kind, score }).collect()))
}

#[derive(Debug, Deserialize)]
pub struct GrepRequest {
    pub repo_path: String,
    pub pattern: String,
    #[serde(default = "default_grep_limit")]
    pub max_results: usize,
}

fn default_grep_limit() -> usize {
    200
}

pub async fn grep_search(Json(request): Json<GrepRequest>) -> Result<Json<Vec<GrepMatch>>> {
    let root = PathBuf::from(&request.repo_path);
    let matches = grep::grep_search(&root, &request.pattern, request.max_results)?;
    Ok(Json(matches))
}

#[derive(Debug, Deserialize)]
pub struct IterativeReadRequest {
    pub repo_path: String,
    pub relative_path: String,
    #[serde(default = "default_cursor")]
    pub cursor_line: usize,
}

fn default_cursor() -> usize {
    1
}

pub async fn iteratively_read_file(State(state): State<Arc<AppState>>, Json(request): Json<IterativeReadRequest>) -> Result<Json<LineRangeResult>> {
    let coordinator = state.coordinator()?;
    let disk_path = resolve_disk_path(&request.repo_path, &request.relative_path)?;
    let result = file_reader::iteratively_read_file(&coordinator.config, &disk_path, request.cursor_line)?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ReadFileOrSummaryRequest {
    pub repo_path: String,
    pub relative_path: String,
}

pub async fn read_file_or_summary(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReadFileOrSummaryRequest>,
) -> Result<Json<FileOrSummary>> {
    let coordinator = state.coordinator()?;
    let disk_path = resolve_disk_path(&request.repo_path, &request.relative_path)?;
    let result = file_reader::read_file_or_summary(&coordinator.parsing, &coordinator.config, &disk_path, &request.relative_path)?;
    Ok(Json(result))
}

fn resolve_disk_path(repo_path: &str, relative_path: &str) -> Result<PathBuf> {
    let candidate = PathBuf::from(repo_path).join(relative_path);
    if !candidate.exists() {
        return Err(Error::NotFound(format!("{relative_path} under {repo_path}")));
    }
    Ok(candidate)
}
