// `/v1/relevant_chunks`: a WebSocket endpoint that takes one `RetrieveRequest`
// text frame and replies with one JSON message carrying the ranked chunks,
// then closes. Kept as a WebSocket (rather than a plain POST) to match the
// client's existing connection-per-request pattern for the other streaming
// endpoint; nothing here is actually incremental since `RetrievalEngine::retrieve`
// already returns a fully-ranked list.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;
use crate::error::{Error, ErrorEnvelope};
use crate::model::{ChunkHash, ScoredChunk};
use crate::retrieval::{FocusHints, RetrievalRequest};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub repo_path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub focus_chunks: Vec<String>,
    #[serde(default)]
    pub focus_files: Vec<String>,
    #[serde(default)]
    pub focus_directories: Vec<String>,
    #[serde(default)]
    pub rerank: bool,
    /// Whether the caller allows this request to trigger opportunistic
    /// indexing when the repo has never been indexed, per §4.4's contract
    /// ("a flag permitting opportunistic top-up indexing"). When set and the
    /// repo has no manifest yet, a non-sync `/v1/update_chunks`-equivalent
    /// job runs to completion (indexing then embedding) before retrieval
    /// proceeds, instead of failing with `RepoNotIndexed`.
    #[serde(default)]
    pub perform_chunking: bool,
}

#[derive(Debug, Serialize)]
struct RetrieveResponse {
    chunks: Vec<ScoredChunk>,
}

pub async fn relevant_chunks(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else { return };
    let request = match serde_json::from_str::<RetrieveRequest>(&text) {
        Ok(request) => request,
        Err(_) => {
            let _ = send_error(&mut socket, &Error::ClientError("malformed retrieval request".to_owned())).await;
            return;
        }
    };

    let coordinator = match state.coordinator() {
        Ok(coordinator) => coordinator,
        Err(err) => {
            let _ = send_error(&mut socket, &err).await;
            return;
        }
    };

    let mut manifest = coordinator.shared_chunks.manifest(&request.repo_path).await;
    if manifest.is_none() && request.perform_chunking {
        if let Err(err) = opportunistic_index(&coordinator, &request.repo_path).await {
            let _ = send_error(&mut socket, &err).await;
            return;
        }
        manifest = coordinator.shared_chunks.manifest(&request.repo_path).await;
    }

    let focus = FocusHints {
        chunk_hashes: request.focus_chunks.into_iter().map(ChunkHash).collect(),
        file_paths: request.focus_files,
        directories: request.focus_directories,
    };
    let retrieval_request = RetrievalRequest {
        repo_path: &request.repo_path,
        query: &request.query,
        focus,
        rerank: request.rerank,
    };

    match coordinator.retrieval.retrieve(retrieval_request, manifest.as_ref()).await {
        Ok(chunks) => {
            let _ = send(&mut socket, &RetrieveResponse { chunks }).await;
        }
        Err(err) => {
            let _ = send_error(&mut socket, &err).await;
        }
    }
}

/// Runs one non-sync indexing-then-embedding pass to completion for
/// `repo_path`, discarding progress frames (this caller only needs the
/// side effect — a populated manifest — not the stream). If another job is
/// already indexing this repo, retrieval proceeds against whatever is
/// already committed rather than waiting on it.
async fn opportunistic_index(coordinator: &Arc<Coordinator>, repo_path: &str) -> crate::error::Result<()> {
    let cancellation = CancellationToken::new();
    let Some(mut handles) = coordinator.start_update_chunks(repo_path.to_owned(), None, false, cancellation.clone()).await else {
        return Ok(());
    };

    let jobs = loop {
        tokio::select! {
            biased;
            result = &mut handles.indexing_task => {
                break result.unwrap_or_else(|join_err| Err(Error::Internal(join_err.into())));
            }
            frame = handles.frames.recv_async() => {
                if frame.is_err() {
                    continue;
                }
            }
        }
    }?;

    let already_embedded = coordinator.store.embedded_chunk_hashes(repo_path).await.unwrap_or_default();
    let embedding_task = crate::coordinator::indexing::start_embedding_task(
        coordinator.store.clone(),
        coordinator.config.clone(),
        coordinator.embedder(),
        already_embedded,
        false,
        jobs,
        repo_path.to_owned(),
        handles.frames_tx,
        cancellation,
    );
    let _ = embedding_task.await;
    Ok(())
}

async fn send<T: Serialize>(socket: &mut WebSocket, value: &T) -> std::result::Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_default();
    socket.send(Message::Text(text)).await
}

async fn send_error(socket: &mut WebSocket, err: &Error) -> std::result::Result<(), axum::Error> {
    send(socket, &ErrorEnvelope::from(err)).await
}
