// Domain entities shared across the scanner, store, embedding pipeline,
// retrieval engine and coordinator. Wire format is snake_case throughout,
// matching the rest of the external contracts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkHash(pub String);

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repo-relative path with the content hash observed at scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkableFile {
    pub relative_path: String,
    pub disk_path: PathBuf,
    pub file_hash: FileHash,
    pub language: Option<String>,
}

/// Kind of symbol captured in a chunk's metadata, extending the teacher's
/// function/documentation query split to also tag classes and imports, plus
/// the `file`/`directory` autocomplete kinds the focus-search surface
/// supports alongside `function`/`class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Import,
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkMetadata {
    pub function_names: Vec<String>,
    pub class_names: Vec<String>,
    pub imports: Vec<String>,
}

/// A contiguous, content-addressed span of source text.
///
/// `start_line`/`end_line` are 1-based and inclusive, matching the external
/// interface's line-numbering convention throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_hash: ChunkHash,
    pub file_path: String,
    pub file_hash: FileHash,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: Option<String>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn compute_hash(file_path: &str, content: &str) -> ChunkHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(file_path.as_bytes());
        // normalize line endings before hashing so re-chunks on a different
        // platform still deduplicate against a prior run
        for line in content.lines() {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        ChunkHash(hasher.finalize().to_hex().to_string())
    }
}

/// A chunk paired with a retrieval score, as handed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A durable record in the chunk store: embedding plus back-references.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_hash: ChunkHash,
    pub embedding: Vec<f32>,
    pub file_path: String,
    pub file_hash: FileHash,
}

/// The current file-path -> file-hash mapping for one repository, guarded
/// per-repo by the coordinator's manifest cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoManifest {
    pub files: std::collections::HashMap<String, FileHash>,
    pub last_scan_unix_secs: u64,
}

impl RepoManifest {
    pub fn file_hashes(&self) -> impl Iterator<Item = &FileHash> {
        self.files.values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskKind {
    Indexing,
    Embedding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileIndexStatus {
    Indexed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerFileStatus {
    pub relative_path: String,
    pub status: FileIndexStatus,
    pub reason: Option<String>,
}

/// One frame of the `/v1/update_chunks` progress stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFrame {
    pub task: TaskKind,
    pub status: TaskStatus,
    pub repo_path: String,
    pub progress: u8,
    #[serde(default)]
    pub indexing_status: Vec<PerFileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An auxiliary, conditionally-fetched URL content record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlContent {
    pub url: String,
    pub display_name: String,
    pub markdown_content: String,
    pub content_hash: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_indexed_unix_secs: u64,
    pub backend_id: String,
}

/// The on-disk review snapshot layout under `<repo>/.git/file-snapshots/<branch>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSnapshotMeta {
    pub review_count: u64,
    pub last_review_unix_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSnapshotEntry {
    pub commit_id: String,
    pub timestamp: u64,
}
