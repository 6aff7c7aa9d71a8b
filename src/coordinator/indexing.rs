// Orchestrates one `/v1/update_chunks` streaming job: scans + chunks the
// repo (the "indexing task"), then embeds whatever lacks a vector (the
// "embedding task"), emitting progress frames on a shared channel. Grounded
// on SPEC_FULL §4.5's two-background-task shape; the WebSocket handler in
// `webserver::indexing` is the actual poll loop that forwards these frames.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunking::{chunk_file, TSLanguageParsing};
use crate::config::Configuration;
use crate::embedding::progress::ChannelProgressReporter;
use crate::embedding::{EmbeddingJob, EmbeddingPipeline};
use crate::error::{Error, Result};
use crate::model::{ChunkHash, FileHash, PerFileStatus, ProgressFrame, RepoManifest, TaskKind, TaskStatus};
use crate::scanner::RepoScanner;
use crate::store::ChunkStore;

use super::manifest::{IndexingGuard, SharedChunks};

pub struct IndexingJobHandles {
    pub indexing_task: JoinHandle<Result<Vec<EmbeddingJob>>>,
    pub embedding_task: Option<JoinHandle<Result<()>>>,
    pub frames: flume::Receiver<ProgressFrame>,
    /// The sending half of `frames`, handed back so the caller can chain
    /// `start_embedding_task` onto the same stream once the indexing task's
    /// job list is ready — both background tasks push onto one channel, per
    /// SPEC_FULL §4.5's single progress stream per WebSocket session.
    pub frames_tx: flume::Sender<ProgressFrame>,
}

/// Starts the indexing job for `repo_path`. Returns `Ok(None)` if another
/// indexing job is already in flight for this repo (the caller reports that
/// as an immediate `IN_PROGRESS` terminal frame rather than spawning a
/// duplicate).
pub async fn start_update_chunks(
    shared_chunks: Arc<SharedChunks>,
    store: Arc<ChunkStore>,
    parsing: Arc<TSLanguageParsing>,
    worker_pool: Arc<rayon::ThreadPool>,
    repo_path: String,
    explicit_files: Option<Vec<String>>,
    sync: bool,
    cancellation: CancellationToken,
) -> Option<IndexingJobHandles> {
    let guard = shared_chunks.try_begin_indexing(&repo_path).await?;
    let (tx, rx) = flume::unbounded();

    let indexing_task = tokio::spawn(run_indexing_task(
        guard,
        shared_chunks.clone(),
        store.clone(),
        parsing,
        worker_pool,
        repo_path.clone(),
        explicit_files,
        sync,
        tx.clone(),
        cancellation.clone(),
    ));

    IndexingJobHandles {
        indexing_task,
        embedding_task: None,
        frames: rx,
        frames_tx: tx,
    }
    .into()
}

#[allow(clippy::too_many_arguments)]
async fn run_indexing_task(
    _guard: IndexingGuard,
    shared_chunks: Arc<SharedChunks>,
    store: Arc<ChunkStore>,
    parsing: Arc<TSLanguageParsing>,
    worker_pool: Arc<rayon::ThreadPool>,
    repo_path: String,
    explicit_files: Option<Vec<String>>,
    sync: bool,
    frames: flume::Sender<ProgressFrame>,
    cancellation: CancellationToken,
) -> Result<Vec<EmbeddingJob>> {
    let scanner_pool = worker_pool.clone();
    let scanner = RepoScanner::new(repo_path.clone());
    let (mut files, scan_skipped) = tokio::task::spawn_blocking(move || scanner_pool.install(|| scanner.scan()))
        .await
        .map_err(|e| Error::Internal(e.into()))?;

    if let Some(only) = explicit_files {
        let only: HashSet<String> = only.into_iter().collect();
        files.retain(|f| only.contains(&f.relative_path));
    }

    let existing_manifest = shared_chunks.manifest(&repo_path).await.unwrap_or_default();
    if !sync {
        // sync=false only (re)chunks newly-discovered/changed files against
        // the existing manifest, per DESIGN.md's resolved open question.
        files.retain(|f| existing_manifest.files.get(&f.relative_path) != Some(&f.file_hash));
    }

    // CPU-bound chunking fans out across the worker pool; the resulting
    // chunks are then upserted sequentially on the async side since the
    // store client isn't `Sync` across a rayon closure boundary.
    let chunking_pool = worker_pool.clone();
    let chunking_parsing = parsing.clone();
    let chunked: Vec<(Vec<crate::model::Chunk>, PerFileStatus)> = {
        let files = files.clone();
        tokio::task::spawn_blocking(move || {
            chunking_pool.install(|| files.par_iter().map(|file| chunk_file(&chunking_parsing, file)).collect())
        })
        .await
        .map_err(|e| Error::Internal(e.into()))?
    };

    let total = chunked.len().max(1);
    // files skipped at scan time (unreadable/binary, §4.2) are reported
    // alongside per-file chunking statuses from the very first frame.
    let mut statuses: Vec<PerFileStatus> = scan_skipped;
    let mut jobs = Vec::new();

    for (idx, (chunks, status)) in chunked.into_iter().enumerate() {
        if cancellation.is_cancelled() {
            break;
        }
        for chunk in chunks {
            store.upsert_chunk(&repo_path, &chunk, None).await?;
            jobs.push(EmbeddingJob { repo_path: repo_path.clone(), chunk });
        }
        statuses.push(status);

        let progress = (((idx + 1) * 100) / total) as u8;
        let _ = frames
            .send_async(ProgressFrame {
                task: TaskKind::Indexing,
                status: TaskStatus::InProgress,
                repo_path: repo_path.clone(),
                progress,
                indexing_status: statuses.clone(),
                message: None,
            })
            .await;
    }

    let mut manifest = if sync { RepoManifest::default() } else { existing_manifest };
    for file in &files {
        manifest.files.insert(file.relative_path.clone(), file.file_hash.clone());
    }
    manifest.last_scan_unix_secs = super::manifest::now_unix_secs();

    if sync {
        let live: HashSet<FileHash> = manifest.files.values().cloned().collect();
        store.delete_stale(&repo_path, &live).await?;
    }

    shared_chunks.commit_manifest(&repo_path, manifest).await;

    let _ = frames
        .send_async(ProgressFrame {
            task: TaskKind::Indexing,
            status: TaskStatus::Completed,
            repo_path: repo_path.clone(),
            progress: 100,
            indexing_status: statuses,
            message: None,
        })
        .await;

    Ok(jobs)
}

/// Starts the embedding task once the indexing task has produced its job
/// list; kept as a separate function so the WebSocket handler can chain them
/// without the indexing task itself depending on the embedding provider.
pub fn start_embedding_task(
    store: Arc<ChunkStore>,
    config: Arc<Configuration>,
    embedder: Arc<dyn crate::embedding::provider::EmbeddingProvider>,
    already_embedded: HashSet<ChunkHash>,
    force_refresh: bool,
    jobs: Vec<EmbeddingJob>,
    repo_path: String,
    frames: flume::Sender<ProgressFrame>,
    cancellation: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let pipeline = EmbeddingPipeline::new(embedder, store, config);
        let (progress_tx, progress_rx) = flume::unbounded();
        let reporter = Arc::new(ChannelProgressReporter::new(progress_tx));

        let repo_for_forward = repo_path.clone();
        let forward = tokio::spawn(async move {
            while let Ok(percent) = progress_rx.recv_async().await {
                let _ = frames
                    .send_async(ProgressFrame {
                        task: TaskKind::Embedding,
                        status: if percent >= 100 { TaskStatus::Completed } else { TaskStatus::InProgress },
                        repo_path: repo_for_forward.clone(),
                        progress: percent,
                        indexing_status: Vec::new(),
                        message: None,
                    })
                    .await;
            }
        });

        let result = pipeline.run(jobs, &already_embedded, force_refresh, reporter, cancellation).await;
        forward.abort();
        result
    })
}
