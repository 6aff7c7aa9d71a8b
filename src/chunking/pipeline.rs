// Bridges the repo scanner's `ChunkableFile` records to content-addressed
// `Chunk`s: reads the file once, asks `TSLanguageParsing` to split it
// (AST-aware where a grammar exists, sliding-window otherwise), then attaches
// symbol metadata and a stable hash to each resulting span.

use crate::chunking::languages::TSLanguageParsing;
use crate::model::{Chunk, ChunkableFile, PerFileStatus, FileIndexStatus};

const CHUNK_MAX_CHARACTERS: usize = 1500;
const CHUNK_COALESCE: usize = 100;

/// Chunks one file, returning the per-file status the indexing progress
/// stream reports alongside the produced chunks (empty on skip).
pub fn chunk_file(parsing: &TSLanguageParsing, file: &ChunkableFile) -> (Vec<Chunk>, PerFileStatus) {
    let content = match std::fs::read_to_string(&file.disk_path) {
        Ok(content) => content,
        Err(err) => {
            return (
                Vec::new(),
                PerFileStatus {
                    relative_path: file.relative_path.clone(),
                    status: FileIndexStatus::Skipped,
                    reason: Some(err.to_string()),
                },
            )
        }
    };

    if content.trim().is_empty() {
        return (
            Vec::new(),
            PerFileStatus {
                relative_path: file.relative_path.clone(),
                status: FileIndexStatus::Indexed,
                reason: None,
            },
        );
    }

    let extension = std::path::Path::new(&file.relative_path)
        .extension()
        .and_then(|ext| ext.to_str());
    let spans = parsing.chunk_file(&file.relative_path, &content, extension);

    let lines: Vec<&str> = content.split('\n').collect();
    let chunks = spans
        .into_iter()
        .filter(|span| span.data.as_deref().map(|d| !d.trim().is_empty()).unwrap_or(false))
        .map(|span| {
            let text = span.data.unwrap_or_default();
            let metadata = file
                .language
                .as_deref()
                .map(|lang| parsing.parse_symbol_metadata(&text, lang))
                .unwrap_or_default();
            // spans are 0-based, end-exclusive line ranges over `lines`;
            // the external interface wants 1-based, inclusive line numbers.
            let start_line = span.start + 1;
            let end_line = span.end.max(span.start + 1).min(lines.len());
            Chunk {
                chunk_hash: Chunk::compute_hash(&file.relative_path, &text),
                file_path: file.relative_path.clone(),
                file_hash: file.file_hash.clone(),
                start_line,
                end_line,
                content: text,
                language: file.language.clone(),
                metadata,
            }
        })
        .collect();

    (
        chunks,
        PerFileStatus {
            relative_path: file.relative_path.clone(),
            status: FileIndexStatus::Indexed,
            reason: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileHash;

    #[test]
    fn chunks_a_small_rust_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n").unwrap();

        let file = ChunkableFile {
            relative_path: "lib.rs".to_owned(),
            disk_path: path,
            file_hash: FileHash("abc".to_owned()),
            language: Some("rust".to_owned()),
        };
        let parsing = TSLanguageParsing::init();
        let (chunks, status) = chunk_file(&parsing, &file);

        assert_eq!(status.status, FileIndexStatus::Indexed);
        assert!(!chunks.is_empty());
        assert!(chunks[0].start_line <= chunks[0].end_line);
    }

    #[test]
    fn empty_file_produces_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.rs");
        std::fs::write(&path, "").unwrap();

        let file = ChunkableFile {
            relative_path: "empty.rs".to_owned(),
            disk_path: path,
            file_hash: FileHash("abc".to_owned()),
            language: Some("rust".to_owned()),
        };
        let parsing = TSLanguageParsing::init();
        let (chunks, status) = chunk_file(&parsing, &file);

        assert!(chunks.is_empty());
        assert_eq!(status.status, FileIndexStatus::Indexed);
    }
}
