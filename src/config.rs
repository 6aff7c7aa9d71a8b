// Process-wide configuration, combining a CLI surface with a serde-driven
// bootstrap payload accepted on `/init`.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Configuration {
    #[clap(short, long, default_value_os_t = default_index_dir())]
    #[serde(default = "default_index_dir")]
    /// Directory to store all persistent state (vector store data, sqlite caches, logs)
    pub index_dir: PathBuf,

    #[clap(long, default_value_t = default_port())]
    #[serde(default = "default_port")]
    /// Bind the webserver to this port
    pub port: u16,

    #[clap(long, default_value_t = default_host())]
    #[serde(default = "default_host")]
    /// Bind the webserver to this host
    pub host: String,

    #[clap(long, default_value_t = default_number_of_workers())]
    #[serde(default = "default_number_of_workers")]
    /// Size of the process-level worker pool used for CPU-bound chunking
    pub number_of_workers: usize,

    #[clap(long, default_value_t = default_max_parallel_tasks())]
    #[serde(default = "default_max_parallel_tasks")]
    /// Maximum number of embedding batches in flight concurrently
    pub max_parallel_tasks: usize,

    #[clap(long, default_value_t = default_number_of_chunks())]
    #[serde(default = "default_number_of_chunks")]
    /// Number of chunks returned by retrieval when re-ranking is disabled
    pub number_of_chunks: usize,

    #[clap(long, default_value_t = default_heartbeat_interval_secs())]
    #[serde(default = "default_heartbeat_interval_secs")]
    /// Interval, in seconds, between store liveness probes
    pub heartbeat_interval_secs: u64,

    #[clap(long, default_value_t = default_store_grace_secs())]
    #[serde(default = "default_store_grace_secs")]
    /// How long the heartbeat may stay red before `StoreUnavailable` is raised
    pub store_grace_secs: u64,

    #[clap(long, default_value_t = default_request_timeout_secs())]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[clap(long, default_value_t = default_embedding_batch_tokens())]
    #[serde(default = "default_embedding_batch_tokens")]
    /// Token budget per embedding batch
    pub embedding_batch_tokens: usize,

    #[clap(long, default_value_t = default_embedding_dimension())]
    #[serde(default = "default_embedding_dimension")]
    /// Dimensionality of vectors returned by the remote embedding provider
    pub embedding_dimension: u64,

    #[clap(long, default_value_t = default_embedding_retry_limit())]
    #[serde(default = "default_embedding_retry_limit")]
    pub embedding_retry_limit: u32,

    #[clap(long)]
    #[serde(default)]
    /// Base URL of the remote embedding provider
    pub embedding_endpoint: Option<String>,

    #[clap(long)]
    #[serde(default)]
    /// Base URL of the remote re-ranking provider; re-ranking is skipped when unset
    pub reranker_endpoint: Option<String>,

    #[clap(long, default_value_t = default_subprocess_grace_secs())]
    #[serde(default = "default_subprocess_grace_secs")]
    /// Grace period given to the store subprocess on shutdown, in seconds
    pub subprocess_grace_secs: u64,

    #[clap(long)]
    #[serde(default)]
    /// Override the vector store's gRPC endpoint; defaults to the co-located subprocess
    pub store_grpc_url: Option<String>,

    #[clap(long, default_value_t = default_directory_search_max_depth())]
    #[serde(default = "default_directory_search_max_depth")]
    pub directory_search_max_depth: usize,

    #[clap(long, default_value_t = default_directory_search_max_entries())]
    #[serde(default = "default_directory_search_max_entries")]
    pub directory_search_max_entries: usize,

    #[clap(long, default_value_t = default_full_file_line_threshold())]
    #[serde(default = "default_full_file_line_threshold")]
    /// Below this many lines, `read-file-or-summary` returns the whole file
    pub full_file_line_threshold: usize,

    #[clap(long, default_value_t = default_iterative_read_page_lines())]
    #[serde(default = "default_iterative_read_page_lines")]
    pub iterative_read_page_lines: usize,
}

impl Configuration {
    /// Directory where daily-rolling log files are written
    pub fn log_dir(&self) -> PathBuf {
        self.index_dir.join("logs")
    }

    /// Directory owned by the embedded vector store subprocess
    pub fn store_storage_dir(&self) -> PathBuf {
        self.index_dir.join("store")
    }

    /// Directory for the tantivy keyword/symbol index
    pub fn keyword_index_dir(&self) -> PathBuf {
        self.index_dir.join("keyword")
    }

    /// Sqlite database path backing the URL content store and manifest mirror
    pub fn sqlite_path(&self) -> PathBuf {
        self.index_dir.join("cache.db")
    }

    /// Merge a bootstrap payload received on `/init` over these defaults.
    ///
    /// Precedence across bootstrap payload, a process-local cache, and a
    /// remote config service is an open question (see DESIGN.md); this
    /// only implements bootstrap-over-defaults.
    pub fn merge_bootstrap(&mut self, bootstrap: ConfigurationBootstrap) {
        if let Some(endpoint) = bootstrap.embedding_endpoint {
            self.embedding_endpoint = Some(endpoint);
        }
        if let Some(endpoint) = bootstrap.reranker_endpoint {
            self.reranker_endpoint = Some(endpoint);
        }
        if let Some(n) = bootstrap.number_of_workers {
            self.number_of_workers = n;
        }
        if let Some(n) = bootstrap.max_parallel_tasks {
            self.max_parallel_tasks = n;
        }
    }
}

/// The subset of `Configuration` a client may override from the `/init` body.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ConfigurationBootstrap {
    #[serde(default)]
    pub embedding_endpoint: Option<String>,
    #[serde(default)]
    pub reranker_endpoint: Option<String>,
    #[serde(default)]
    pub number_of_workers: Option<usize>,
    #[serde(default)]
    pub max_parallel_tasks: Option<usize>,
}

fn default_index_dir() -> PathBuf {
    match directories::ProjectDirs::from("ai", "codestory", "codeindex-sidecar") {
        Some(dirs) => dirs.data_dir().to_owned(),
        None => "codeindex_sidecar".into(),
    }
}

fn default_port() -> u16 {
    8001
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_number_of_workers() -> usize {
    1
}

fn default_max_parallel_tasks() -> usize {
    60
}

fn default_number_of_chunks() -> usize {
    25
}

fn default_heartbeat_interval_secs() -> u64 {
    3
}

fn default_store_grace_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    3000
}

fn default_embedding_batch_tokens() -> usize {
    8191
}

fn default_embedding_dimension() -> u64 {
    1536
}

fn default_embedding_retry_limit() -> u32 {
    4
}

fn default_subprocess_grace_secs() -> u64 {
    30
}

fn default_directory_search_max_depth() -> usize {
    5
}

fn default_directory_search_max_entries() -> usize {
    7
}

fn default_full_file_line_threshold() -> usize {
    200
}

fn default_iterative_read_page_lines() -> usize {
    200
}
