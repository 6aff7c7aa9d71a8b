// Batched remote embedding with bounded concurrency, progress reporting and
// idempotent upsert into the chunk store. Grounded on the teacher's
// `indexes::caching::{embed_queued_points, batched_embed_or_flush_queue}`
// (batch sizing, retry-on-error, queue draining), generalized from the
// teacher's local onnx `Embedder` trait to a remote HTTP provider.

pub mod progress;
pub mod provider;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::model::{Chunk, ChunkHash};
use crate::store::ChunkStore;

pub use progress::ProgressReporter;
pub use provider::{EmbeddingError, EmbeddingProvider, RemoteEmbeddingProvider};

/// One unit of embedding work: a chunk's content keyed by its hash, plus the
/// repo it belongs to (the store keys vector records by repo path +
/// chunk hash via the `repo_path` payload field).
pub struct EmbeddingJob {
    pub repo_path: String,
    pub chunk: Chunk,
}

pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<ChunkStore>,
    config: Arc<Configuration>,
}

impl EmbeddingPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<ChunkStore>, config: Arc<Configuration>) -> Self {
        Self { provider, store, config }
    }

    /// Embeds and upserts every job not already present in the store (unless
    /// `force_refresh`), reporting progress as a fraction of *chunks*
    /// completed (not batches), and cancelling cooperatively via
    /// `cancellation`.
    pub async fn run(
        &self,
        jobs: Vec<EmbeddingJob>,
        already_embedded: &HashSet<ChunkHash>,
        force_refresh: bool,
        progress: Arc<dyn ProgressReporter>,
        cancellation: tokio_util::sync::CancellationToken,
    ) -> Result<()> {
        let pending: Vec<EmbeddingJob> = jobs
            .into_iter()
            .filter(|job| force_refresh || !already_embedded.contains(&job.chunk.chunk_hash))
            .collect();

        let total = pending.len();
        if total == 0 {
            progress.report(100).await;
            return Ok(());
        }

        let batches = batch_by_token_budget(pending, self.config.embedding_batch_tokens);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_tasks));
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut handles = Vec::new();

        for batch in batches {
            let semaphore = semaphore.clone();
            let provider = self.provider.clone();
            let store = self.store.clone();
            let completed = completed.clone();
            let progress = progress.clone();
            let cancellation = cancellation.clone();
            let retry_limit = self.config.embedding_retry_limit;
            let batch_len = batch.len();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                if cancellation.is_cancelled() {
                    return Ok(());
                }
                let texts: Vec<String> = batch.iter().map(|j| j.chunk.content.clone()).collect();
                let vectors = embed_with_retry(provider.as_ref(), &texts, retry_limit).await?;

                for (job, vector) in batch.into_iter().zip(vectors.into_iter()) {
                    store
                        .upsert_chunk(&job.repo_path, &job.chunk, Some(&vector))
                        .await?;
                }

                let done = completed.fetch_add(batch_len, std::sync::atomic::Ordering::SeqCst) + batch_len;
                progress.report(((done * 100) / total.max(1)) as u8).await;
                Ok::<(), Error>(())
            }));
        }

        let mut first_error = None;
        for handle in handles {
            // cancellation does not abort in-flight batches; every spawned
            // task is awaited to completion so no partial uploads are left
            // inconsistent (store upsert is atomic per chunk hash).
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(?err, "embedding batch failed permanently");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::warn!(?join_err, "embedding batch task panicked");
                }
            }
        }

        progress.report(100).await;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    retry_limit: u32,
) -> Result<Vec<Vec<f32>>> {
    let mut attempt = 0;
    loop {
        match provider.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(EmbeddingError::AuthExpired) => return Err(Error::AuthError("embedding token expired".into())),
            Err(EmbeddingError::Permanent(message)) => return Err(Error::RemoteServiceError(message)),
            Err(EmbeddingError::RateLimited) | Err(EmbeddingError::Transient(_)) if attempt < retry_limit => {
                let backoff = std::time::Duration::from_millis(200 * 2u64.pow(attempt));
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(Error::RemoteServiceError(err.to_string())),
        }
    }
}

/// Greedily packs jobs into batches under `token_budget`, counted with the
/// same `cl100k_base` tokenizer the teacher's LLM call sites use elsewhere
/// in the workspace, so a batch's token budget matches what the remote
/// embedding provider actually bills against.
fn batch_by_token_budget(jobs: Vec<EmbeddingJob>, token_budget: usize) -> Vec<Vec<EmbeddingJob>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_tokens = 0usize;

    for job in jobs {
        let tokens = estimate_tokens(&job.chunk.content);
        if !current.is_empty() && current_tokens + tokens > token_budget {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += tokens;
        current.push(job);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn estimate_tokens(text: &str) -> usize {
    static ENCODING: once_cell::sync::Lazy<tiktoken_rs::CoreBPE> =
        once_cell::sync::Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer tables are bundled"));
    ENCODING.encode_ordinary(text).len().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkMetadata, FileHash};

    fn job(hash: &str, content: &str) -> EmbeddingJob {
        EmbeddingJob {
            repo_path: "/repo".to_owned(),
            chunk: Chunk {
                chunk_hash: ChunkHash(hash.to_owned()),
                file_path: "a.rs".to_owned(),
                file_hash: FileHash("fh".to_owned()),
                start_line: 1,
                end_line: 1,
                content: content.to_owned(),
                language: Some("rust".to_owned()),
                metadata: ChunkMetadata::default(),
            },
        }
    }

    #[test]
    fn batches_respect_the_token_budget() {
        let jobs = vec![job("a", &"x".repeat(40)), job("b", &"y".repeat(40)), job("c", "z")];
        // each ~10 tokens; budget of 15 forces a after b together only if they fit
        let batches = batch_by_token_budget(jobs, 15);
        assert!(batches.len() >= 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }
}
