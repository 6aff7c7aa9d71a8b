// Review snapshot broker: a thin, file-system-backed implementation of the
// "take a snapshot, diff the working tree against it" contract the IDE's
// review UI consumes. The UI itself and the IDE-side diff rendering are out
// of scope; this module only owns the on-disk layout and the diff
// computation. Grounded on `git::commit_statistics` for the gix diff
// plumbing (Histogram algorithm, `UnifiedDiffBuilder`) and on the scanner
// for file enumeration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use gix::diff::blob::sink::Counter;
use gix::diff::blob::UnifiedDiffBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{CommitSnapshotEntry, ReviewSnapshotMeta};
use crate::scanner::RepoScanner;

/// One file's diff against its last-reviewed snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FileDiff {
    pub relative_path: String,
    pub diff: String,
    pub insertions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SnapshotIndex {
    /// relative path -> blake3 of the path, used as the on-disk file name
    /// under `files/` so arbitrary nested paths never need directory
    /// creation per entry.
    entries: HashMap<String, String>,
}

fn current_branch_name(repo_path: &Path) -> String {
    gix::open(repo_path)
        .ok()
        .and_then(|repo| repo.head_name().ok().flatten())
        .map(|name| name.shorten().to_string())
        .unwrap_or_else(|| "HEAD".to_owned())
}

fn head_commit_id_and_timestamp(repo_path: &Path) -> Option<(String, u64)> {
    let repo = gix::open(repo_path).ok()?;
    let commit = repo
        .head()
        .ok()?
        .into_fully_peeled_id()
        .ok()??
        .object()
        .ok()?
        .into_commit();
    let id = commit.id().to_string();
    let seconds = commit.time().ok()?.seconds;
    Some((id, seconds.max(0) as u64))
}

fn snapshot_dir(repo_path: &Path, branch: &str) -> PathBuf {
    repo_path.join(".git").join("file-snapshots").join(sanitize_branch(branch))
}

fn sanitize_branch(branch: &str) -> String {
    branch.replace(['/', '\\'], "_")
}

fn files_dir(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join("files")
}

fn now_unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Copies the current working tree into `<repo>/.git/file-snapshots/<branch>/`,
/// bumping the review counter. Idempotent in the sense that repeated calls
/// just overwrite the flat file copies and advance the counter; nothing is
/// ever merged across snapshots.
pub fn take_snapshot(repo_path: &Path) -> Result<ReviewSnapshotMeta> {
    let branch = current_branch_name(repo_path);
    let dir = snapshot_dir(repo_path, &branch);
    let files_dir = files_dir(&dir);
    std::fs::create_dir_all(&files_dir).map_err(|e| Error::Internal(e.into()))?;

    let scanner = RepoScanner::new(repo_path);
    let (files, _skipped) = scanner.scan();

    let mut index = SnapshotIndex::default();
    let mut commit_entries: HashMap<String, CommitSnapshotEntry> = HashMap::new();
    let (commit_id, commit_timestamp) = head_commit_id_and_timestamp(repo_path).unwrap_or_default();

    for file in &files {
        let Ok(content) = std::fs::read(&file.disk_path) else {
            continue;
        };
        let stored_name = blake3::hash(file.relative_path.as_bytes()).to_hex().to_string();
        std::fs::write(files_dir.join(&stored_name), content).map_err(|e| Error::Internal(e.into()))?;
        index.entries.insert(file.relative_path.clone(), stored_name);
        commit_entries.insert(
            file.relative_path.clone(),
            CommitSnapshotEntry { commit_id: commit_id.clone(), timestamp: commit_timestamp },
        );
    }

    write_json(&dir.join("diff-snapshot.json"), &index)?;
    write_json(&dir.join("commit-snapshot.json"), &commit_entries)?;

    let previous: ReviewSnapshotMeta = read_json(&dir.join("snapshot-meta.json")).unwrap_or(ReviewSnapshotMeta {
        review_count: 0,
        last_review_unix_secs: 0,
    });
    let meta = ReviewSnapshotMeta {
        review_count: previous.review_count + 1,
        last_review_unix_secs: now_unix_secs(),
    };
    write_json(&dir.join("snapshot-meta.json"), &meta)?;

    Ok(meta)
}

/// Diffs the current working tree against the last snapshot taken for the
/// current branch. A file present in the working tree but absent from the
/// snapshot is reported as a full addition; the reverse is not reported here
/// since `get_changes` only walks files the scanner currently sees (deleted
/// files are a separate "removed" signal the IDE-side UI already tracks).
pub fn get_changes(repo_path: &Path) -> Result<Vec<FileDiff>> {
    let branch = current_branch_name(repo_path);
    let dir = snapshot_dir(repo_path, &branch);
    let index: SnapshotIndex = read_json(&dir.join("diff-snapshot.json")).unwrap_or_default();
    let files_dir = files_dir(&dir);

    let scanner = RepoScanner::new(repo_path);
    let (files, _skipped) = scanner.scan();

    let mut diffs = Vec::new();
    for file in files {
        let Ok(current) = std::fs::read_to_string(&file.disk_path) else {
            continue;
        };
        let previous = index
            .entries
            .get(&file.relative_path)
            .and_then(|stored_name| std::fs::read_to_string(files_dir.join(stored_name)).ok())
            .unwrap_or_default();

        if previous == current {
            continue;
        }

        let input = gix::diff::blob::intern::InternedInput::new(previous.as_str(), current.as_str());
        let counted = gix::diff::blob::diff(
            gix::diff::blob::Algorithm::Histogram,
            &input,
            Counter::new(UnifiedDiffBuilder::new(&input)),
        );

        diffs.push(FileDiff {
            relative_path: file.relative_path,
            diff: counted.wrapped.as_str().to_owned(),
            insertions: counted.insertions as usize,
            deletions: counted.removals as usize,
        });
    }

    Ok(diffs)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Internal(e.into()))?;
    std::fs::write(path, bytes).map_err(|e| Error::Internal(e.into()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) {
        std::process::Command::new("git").arg("init").arg("-q").current_dir(dir).status().unwrap();
        std::process::Command::new("git")
            .args(["config", "user.email", "a@b.com"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["config", "user.name", "a"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::fs::write(dir.join("a.txt"), "one\n").unwrap();
        std::process::Command::new("git").args(["add", "."]).current_dir(dir).status().unwrap();
        std::process::Command::new("git")
            .args(["commit", "-q", "-m", "initial"])
            .current_dir(dir)
            .status()
            .unwrap();
    }

    #[test]
    fn snapshot_then_edit_produces_a_diff() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let meta = take_snapshot(dir.path()).unwrap();
        assert_eq!(meta.review_count, 1);

        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        let changes = get_changes(dir.path()).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].relative_path, "a.txt");
        assert!(changes[0].insertions >= 1);
    }

    #[test]
    fn a_second_snapshot_advances_the_review_counter() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        take_snapshot(dir.path()).unwrap();
        let second = take_snapshot(dir.path()).unwrap();
        assert_eq!(second.review_count, 2);
    }
}
