// Remote embedding + re-ranking HTTP clients. The teacher's root package
// embeds a local onnx `Embedder` trait; this generalizes its shape to a
// remote provider, the way the sidecar fork's own `reqwest` dependency
// implies (see DESIGN.md).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Configuration;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding auth token expired")]
    AuthExpired,
    #[error("embedding provider rate limited the request")]
    RateLimited,
    #[error("transient embedding error: {0}")]
    Transient(String),
    #[error("permanent embedding error: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponseItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingResponseItem>,
}

pub struct RemoteEmbeddingProvider {
    http: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl RemoteEmbeddingProvider {
    pub fn from_config(config: &Configuration, bearer_token: Option<String>) -> Option<Self> {
        let endpoint = config.embedding_endpoint.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            endpoint,
            bearer_token,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.http.post(&self.endpoint).json(&EmbeddingRequest { input: texts });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EmbeddingError::Transient(err.to_string()))?;

        match response.status() {
            status if status == reqwest::StatusCode::UNAUTHORIZED => Err(EmbeddingError::AuthExpired),
            status if status == reqwest::StatusCode::TOO_MANY_REQUESTS => Err(EmbeddingError::RateLimited),
            status if status.is_server_error() => {
                Err(EmbeddingError::Transient(format!("server error: {status}")))
            }
            status if !status.is_success() => {
                Err(EmbeddingError::Permanent(format!("embedding request failed: {status}")))
            }
            _ => {
                let parsed: EmbeddingResponse = response
                    .json()
                    .await
                    .map_err(|err| EmbeddingError::Permanent(err.to_string()))?;
                Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
            }
        }
    }
}

/// Used when no `embedding_endpoint` is configured; every call fails
/// permanently rather than the coordinator needing an `Option<dyn Provider>`
/// threaded through the indexing and retrieval call sites.
pub struct NullEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Permanent("no embedding endpoint configured".into()))
    }
}

/// The query-embedding call site the retrieval engine uses; distinct from
/// batch embedding only in that it never persists the resulting vector.
pub async fn embed_query(provider: &dyn EmbeddingProvider, query: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = provider.embed_batch(std::slice::from_ref(&query.to_owned())).await?;
    vectors
        .pop()
        .ok_or_else(|| EmbeddingError::Permanent("empty embedding response".into()))
}

/// Remote re-ranker: given a query and candidate chunk texts, returns the
/// indices of `candidates` in re-ranked order.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>, EmbeddingError>;
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponseItem {
    index: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseItem>,
}

pub struct RemoteReranker {
    http: reqwest::Client,
    endpoint: String,
}

impl RemoteReranker {
    pub fn from_config(config: &Configuration) -> Option<Self> {
        let endpoint = config.reranker_endpoint.clone()?;
        Some(Self { http: reqwest::Client::new(), endpoint })
    }
}

#[async_trait]
impl Reranker for RemoteReranker {
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>, EmbeddingError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&RerankRequest { query, documents: candidates })
            .send()
            .await
            .map_err(|err| EmbeddingError::Transient(err.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Permanent(format!(
                "rerank request failed: {}",
                response.status()
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Permanent(err.to_string()))?;
        Ok(parsed.results.into_iter().map(|item| item.index).collect())
    }
}
