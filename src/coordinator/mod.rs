// The session coordinator: the single-process owner of the store
// subprocess, the store client pool, the keyword index, the chunking worker
// pool and the per-repo manifest cache. One `Coordinator` is built at
// startup and handed to every webserver route, per SPEC_FULL §4.5.
//
// Grounded on the teacher's `Application` (owns the semantic client, the
// repo pool, the background poll task) — generalized here to also own the
// embedding/reranking providers and the rayon worker pool the indexing task
// borrows.

pub mod indexing;
pub mod manifest;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunking::languages::TSLanguageParsing;
use crate::config::Configuration;
use crate::embedding::provider::{EmbeddingProvider, NullEmbeddingProvider, RemoteEmbeddingProvider, RemoteReranker, Reranker};
use crate::error::{Error, Result};
use crate::retrieval::RetrievalEngine;
use crate::store::{spawn_heartbeat, ChunkStore, ChunkStoreSubprocess, KeywordIndex, StoreClient};

use manifest::SharedChunks;

pub struct Coordinator {
    pub config: Arc<Configuration>,
    pub store: Arc<ChunkStore>,
    pub store_client: Arc<StoreClient>,
    pub parsing: Arc<TSLanguageParsing>,
    pub shared_chunks: Arc<SharedChunks>,
    pub retrieval: Arc<RetrievalEngine>,
    pub worker_pool: Arc<rayon::ThreadPool>,
    embedder: Arc<dyn EmbeddingProvider>,
    store_subprocess: tokio::sync::Mutex<ChunkStoreSubprocess>,
    heartbeat: JoinHandle<()>,
}

impl Coordinator {
    /// Brings up the whole local-store side of the daemon: adopts or spawns
    /// the vector store subprocess, connects the dual client, ensures the
    /// collection schema, opens the keyword index and builds the embedding
    /// and re-ranking providers from configuration. Idempotent on the store
    /// subprocess half (a second call adopts whatever the first call spawned
    /// since the health check passes).
    pub async fn initialize(config: Arc<Configuration>) -> Result<Arc<Self>> {
        std::fs::create_dir_all(&config.index_dir).map_err(|e| Error::Internal(e.into()))?;

        let store_subprocess = ChunkStoreSubprocess::initialize(config.clone())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let store_client = Arc::new(StoreClient::connect(&config).await?);
        crate::store::qdrant_process::wait_for_store_ready(store_client.async_handle().as_ref()).await;

        let keyword = KeywordIndex::open(&config.keyword_index_dir())?;
        let store = Arc::new(ChunkStore::new(config.clone(), store_client.clone(), keyword));
        store.ensure_schema().await?;

        let embedder: Arc<dyn EmbeddingProvider> = RemoteEmbeddingProvider::from_config(&config, None)
            .map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>)
            .unwrap_or_else(|| Arc::new(NullEmbeddingProvider));
        let reranker: Option<Arc<dyn Reranker>> =
            RemoteReranker::from_config(&config).map(|r| Arc::new(r) as Arc<dyn Reranker>);

        let retrieval = Arc::new(RetrievalEngine::new(store.clone(), embedder.clone(), reranker, config.clone()));

        let worker_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.number_of_workers)
                .build()
                .map_err(|e| Error::Internal(e.into()))?,
        );

        let heartbeat = spawn_heartbeat(store_client.clone(), &config);

        Ok(Arc::new(Self {
            config,
            store,
            store_client,
            parsing: Arc::new(TSLanguageParsing::init()),
            shared_chunks: Arc::new(SharedChunks::default()),
            retrieval,
            worker_pool,
            embedder,
            store_subprocess: tokio::sync::Mutex::new(store_subprocess),
            heartbeat,
        }))
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Starts one `/v1/update_chunks` job. Returns `None` if a job is
    /// already running for this repo.
    pub async fn start_update_chunks(
        &self,
        repo_path: String,
        explicit_files: Option<Vec<String>>,
        sync: bool,
        cancellation: CancellationToken,
    ) -> Option<indexing::IndexingJobHandles> {
        indexing::start_update_chunks(
            self.shared_chunks.clone(),
            self.store.clone(),
            self.parsing.clone(),
            self.worker_pool.clone(),
            repo_path,
            explicit_files,
            sync,
            cancellation,
        )
        .await
    }

    /// Starts an optional background watcher for `repo_path`: on a debounced
    /// filesystem change (or when the poll-interval ladder elapses with no
    /// change), kicks off a non-sync `/v1/update_chunks`-equivalent job so
    /// the manifest stays close to current without a client re-polling.
    /// Returns the task handle so the caller can abort it when the repo is
    /// no longer of interest; per SPEC_FULL §4.5 nothing else in the core
    /// depends on this running.
    pub fn watch_repo(self: &Arc<Self>, repo_path: String) -> Result<JoinHandle<()>> {
        let mut repo_watcher = watcher::RepoWatcher::start(std::path::Path::new(&repo_path))?;
        let coordinator = self.clone();
        Ok(tokio::spawn(async move {
            loop {
                let sleep = tokio::time::sleep(repo_watcher.jittered_interval());
                tokio::select! {
                    _ = sleep => {}
                    _ = repo_watcher.next_change() => {}
                }

                let cancellation = CancellationToken::new();
                match coordinator.start_update_chunks(repo_path.clone(), None, false, cancellation.clone()).await {
                    Some(mut handles) => {
                        // drain/discard frames while waiting for the job list,
                        // then chain the embedding task onto the same channel
                        // so files the watcher picks up actually get vectors,
                        // not just a keyword-indexed chunk (otherwise vector
                        // search would silently miss them).
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
                        };
                        if let Ok(jobs) = jobs {
                            let already_embedded =
                                coordinator.store.embedded_chunk_hashes(&repo_path).await.unwrap_or_default();
                            let embedding_task = indexing::start_embedding_task(
                                coordinator.store.clone(),
                                coordinator.config.clone(),
                                coordinator.embedder(),
                                already_embedded,
                                false,
                                jobs,
                                repo_path.clone(),
                                handles.frames_tx,
                                cancellation,
                            );
                            let _ = embedding_task.await;
                        }
                    }
                    None => {
                        // Another job (client-triggered or a prior watch tick)
                        // is already indexing this repo; back off instead of
                        // hammering the manifest guard.
                        repo_watcher.backoff();
                    }
                }
            }
        }))
    }

    /// Graceful shutdown: stop accepting new heartbeat cycles, then give the
    /// store subprocess `subprocess_grace_secs` to exit on its own. Safe to
    /// call more than once (the subprocess handle is consumed on first use).
    pub async fn shutdown(&self) {
        self.heartbeat.abort();
        let grace = Duration::from_secs(self.config.subprocess_grace_secs);
        self.store_subprocess.lock().await.stop(grace).await;
    }
}
