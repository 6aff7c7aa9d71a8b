// `/v1/update_chunks`: a WebSocket streaming job. The client sends one
// `IndexingRequest` as the first text frame; the server chains the indexing
// task into the embedding task on the coordinator's shared progress channel
// and forwards every `ProgressFrame` to the socket until both tasks finish.
// Grounded on `coordinator::indexing`'s two-task shape; this handler is the
// "poll loop" SPEC_FULL §4.5 describes, expressed as a forwarding loop over
// `flume::Receiver<ProgressFrame>` rather than literal 500ms polling since
// the channel already blocks until the next frame exists.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::model::{ProgressFrame, TaskKind, TaskStatus};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexingRequest {
    pub repo_path: String,
    #[serde(default)]
    pub chunkable_files: Option<Vec<String>>,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub force_refresh: bool,
}

pub async fn update_chunks(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(mut socket: WebSocket, state: Arc<AppState>) {
    let request = match next_request::<IndexingRequest>(&mut socket).await {
        Some(request) => request,
        None => return,
    };

    let coordinator = match state.coordinator() {
        Ok(coordinator) => coordinator,
        Err(err) => {
            let _ = send_frame(&mut socket, &failed_frame(&request.repo_path, &err.to_string())).await;
            return;
        }
    };

    let cancellation = CancellationToken::new();
    let embedding_cancellation = cancellation.clone();
    let handles = coordinator
        .start_update_chunks(request.repo_path.clone(), request.chunkable_files, request.sync, cancellation.clone())
        .await;

    let Some(mut handles) = handles else {
        let frame = ProgressFrame {
            task: TaskKind::Indexing,
            status: TaskStatus::Failed,
            repo_path: request.repo_path.clone(),
            progress: 0,
            indexing_status: Vec::new(),
            message: Some("another job is already indexing this repo".to_owned()),
        };
        let _ = send_frame(&mut socket, &frame).await;
        return;
    };

    // Drain indexing frames as they arrive, forwarding each to the socket;
    // stop draining (but keep the channel alive) once the indexing task
    // itself has produced its job list, so the embedding task below can
    // push its own frames onto the same `frames`/`frames_tx` channel.
    let jobs = loop {
        tokio::select! {
            biased;
            result = &mut handles.indexing_task => {
                break result.unwrap_or_else(|join_err| Err(crate::error::Error::Internal(join_err.into())));
            }
            frame = handles.frames.recv_async() => {
                match frame {
                    Ok(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            // cooperative cancellation, not a forceful abort: the
                            // task observes this and winds down on its own, so an
                            // in-flight `store.upsert_chunk().await` is never cut
                            // mid-write (§5/§9).
                            cancellation.cancel();
                            return;
                        }
                    }
                    // the indexing task drops its sender on return; the
                    // `indexing_task` branch above resolves in the same
                    // scheduler tick, so loop back and let it win the race.
                    Err(_) => continue,
                }
            }
        }
    };

    let jobs = match jobs {
        Ok(jobs) => jobs,
        Err(err) => {
            let _ = send_frame(&mut socket, &failed_frame(&request.repo_path, &err.to_string())).await;
            return;
        }
    };

    // §8 idempotence: a second `/v1/update_chunks` on an unchanged repo must
    // make zero embedding calls, so skip whatever the store already has a
    // vector record for (unless the caller explicitly asked for a refresh).
    let already_embedded: HashSet<_> = if request.force_refresh {
        HashSet::new()
    } else {
        coordinator.store.embedded_chunk_hashes(&request.repo_path).await.unwrap_or_else(|err| {
            tracing::warn!(?err, "failed to load already-embedded chunk hashes, embedding everything");
            HashSet::new()
        })
    };
    let mut embedding_task = crate::coordinator::indexing::start_embedding_task(
        coordinator.store.clone(),
        coordinator.config.clone(),
        coordinator.embedder(),
        already_embedded,
        request.force_refresh,
        jobs,
        request.repo_path.clone(),
        handles.frames_tx,
        cancellation,
    );

    loop {
        tokio::select! {
            biased;
            frame = handles.frames.recv_async() => {
                match frame {
                    Ok(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            embedding_cancellation.cancel();
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            result = &mut embedding_task, if !embedding_task.is_finished() => {
                if let Ok(Err(err)) = result {
                    let _ = send_frame(&mut socket, &failed_frame(&request.repo_path, &err.to_string())).await;
                }
                break;
            }
        }
    }
}

fn failed_frame(repo_path: &str, message: &str) -> ProgressFrame {
    ProgressFrame {
        task: TaskKind::Indexing,
        status: TaskStatus::Failed,
        repo_path: repo_path.to_owned(),
        progress: 0,
        indexing_status: Vec::new(),
        message: Some(message.to_owned()),
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ProgressFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(text)).await
}

async fn next_request<T: serde::de::DeserializeOwned>(socket: &mut WebSocket) -> Option<T> {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => return serde_json::from_str(&text).ok(),
            Message::Binary(bytes) => return serde_json::from_slice(&bytes).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}
