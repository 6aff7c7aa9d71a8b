// Repository file enumeration: gitignore-aware walk, size ceiling, content
// hashing and language tagging. Grounded in the teacher's `FileWalker`
// (ignore::WalkBuilder + rayon), but self-contained: scanning and chunking
// are separate steps here rather than threaded through a shared iterator
// trait.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::model::{ChunkableFile, FileHash, FileIndexStatus, PerFileStatus};

pub const AVG_LINE_LEN: u64 = 30;
pub const MAX_LINE_COUNT: u64 = 20_000;
pub const MAX_FILE_LEN: u64 = AVG_LINE_LEN * MAX_LINE_COUNT;

fn should_index_entry(entry: &ignore::DirEntry) -> bool {
    entry
        .path()
        .file_name()
        .map(|name| name != ".git")
        .unwrap_or(true)
}

/// Enumerates the chunkable files under one repository root.
pub struct RepoScanner {
    root: PathBuf,
}

impl RepoScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walks the repository honoring `.gitignore`, skipping files above
    /// [`MAX_FILE_LEN`], and hashes the remainder in parallel. Files that
    /// fail to read as UTF-8 (the common binary-file case) or can't be read
    /// at all (permissions) are reported as `Skipped` per §4.2's edge case
    /// rather than silently dropped.
    pub fn scan(&self) -> (Vec<ChunkableFile>, Vec<PerFileStatus>) {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(false)
            .filter_entry(should_index_entry)
            .build();

        let file_list: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter(|entry| matches!(entry.metadata(), Ok(meta) if meta.len() < MAX_FILE_LEN))
            .map(|entry| entry.into_path())
            .collect();

        let results: Vec<Result<ChunkableFile, PerFileStatus>> =
            file_list.into_par_iter().map(|disk_path| self.read_one(&disk_path)).collect();

        let mut files = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(status) => skipped.push(status),
            }
        }
        (files, skipped)
    }

    fn read_one(&self, disk_path: &Path) -> Result<ChunkableFile, PerFileStatus> {
        let relative_path = disk_path
            .strip_prefix(&self.root)
            .unwrap_or(disk_path)
            .to_string_lossy()
            .replace('\\', "/");
        let content = std::fs::read_to_string(disk_path).map_err(|err| PerFileStatus {
            relative_path: relative_path.clone(),
            status: FileIndexStatus::Skipped,
            reason: Some(err.to_string()),
        })?;
        let file_hash = FileHash(blake3::hash(content.as_bytes()).to_hex().to_string());
        let language = language_for_extension(disk_path);
        Ok(ChunkableFile {
            relative_path,
            disk_path: disk_path.to_owned(),
            file_hash,
            language,
        })
    }
}

/// Maps a file extension to the language identifier used across chunking,
/// keyword indexing and the `/v1/update_chunks` progress frames.
pub fn language_for_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let lang = match ext {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        _ => return None,
    };
    Some(lang.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_and_hashes_files_skipping_ignored_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "ignored.rs\n").unwrap();
        std::fs::write(dir.path().join("ignored.rs"), "fn skip() {}\n").unwrap();

        let scanner = RepoScanner::new(dir.path());
        let (files, skipped) = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "lib.rs");
        assert_eq!(files[0].language.as_deref(), Some("rust"));
        assert!(skipped.is_empty());
    }

    #[test]
    fn binary_files_are_reported_as_skipped_rather_than_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff_u8, 0x00, 0xfe, 0x80, 0x01]).unwrap();

        let scanner = RepoScanner::new(dir.path());
        let (files, skipped) = scanner.scan();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "lib.rs");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].relative_path, "blob.bin");
        assert_eq!(skipped[0].status, FileIndexStatus::Skipped);
        assert!(skipped[0].reason.is_some());
    }

    #[test]
    fn language_for_extension_recognizes_supported_languages() {
        assert_eq!(
            language_for_extension(Path::new("a/b.py")),
            Some("python".to_owned())
        );
        assert_eq!(language_for_extension(Path::new("a/b.md")), None);
    }
}
