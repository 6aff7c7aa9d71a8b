// Per-repo shared chunk cache: the latest `RepoManifest` plus an indexing
// guard, one entry per repository path. Grounded on the teacher's
// `repo::state::RepositoryPool` (`scc::HashMap<RepoRef, Repository>`,
// per-entry locking) and `bg_poll::background_polling`'s
// `scc::hash_map::Entry` usage pattern.
//
// Invariant carried from SPEC_FULL §3: at most one indexing job mutates a
// repo's manifest at a time; retrieval reads without a guard and tolerates a
// stale manifest.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::model::RepoManifest;

#[derive(Default)]
struct Entry {
    manifest: Arc<RwLock<RepoManifest>>,
    indexing_lock: Arc<Mutex<()>>,
}

#[derive(Default)]
pub struct SharedChunks {
    entries: scc::HashMap<String, Entry>,
}

/// Held by an in-flight indexing job; its presence is exactly the
/// "one indexing job proceeds, the other observes in-progress state"
/// invariant. Dropping it releases the repo for the next indexing attempt.
pub struct IndexingGuard(#[allow(dead_code)] OwnedMutexGuard<()>);

impl SharedChunks {
    /// A lock-free read of the latest committed manifest; `None` means the
    /// repo has never been indexed.
    pub async fn manifest(&self, repo_path: &str) -> Option<RepoManifest> {
        let lock = self.entries.read_async(&repo_path.to_owned(), |_, entry| entry.manifest.clone()).await?;
        Some(lock.read().await.clone())
    }

    /// Attempts to acquire the per-repo indexing guard without blocking;
    /// `None` means an indexing job is already running for this repo.
    pub async fn try_begin_indexing(&self, repo_path: &str) -> Option<IndexingGuard> {
        let lock = match self.entries.entry_async(repo_path.to_owned()).await {
            scc::hash_map::Entry::Occupied(existing) => existing.get().indexing_lock.clone(),
            scc::hash_map::Entry::Vacant(vacant) => {
                let entry = Entry::default();
                let lock = entry.indexing_lock.clone();
                vacant.insert_entry(entry);
                lock
            }
        };
        lock.try_lock_owned().ok().map(IndexingGuard)
    }

    /// Commits a freshly-scanned manifest for `repo_path`, called by the
    /// indexing task while it holds the `IndexingGuard`.
    pub async fn commit_manifest(&self, repo_path: &str, manifest: RepoManifest) {
        let target = match self.entries.entry_async(repo_path.to_owned()).await {
            scc::hash_map::Entry::Occupied(existing) => existing.get().manifest.clone(),
            scc::hash_map::Entry::Vacant(vacant) => {
                let entry = Entry::default();
                let target = entry.manifest.clone();
                vacant.insert_entry(entry);
                target
            }
        };
        *target.write().await = manifest;
    }
}

pub fn now_unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_second_indexing_attempt_is_refused_while_the_first_holds_the_guard() {
        let shared = SharedChunks::default();
        let first = shared.try_begin_indexing("/repo").await;
        assert!(first.is_some());

        let second = shared.try_begin_indexing("/repo").await;
        assert!(second.is_none());

        drop(first);
        let third = shared.try_begin_indexing("/repo").await;
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn manifest_round_trips() {
        let shared = SharedChunks::default();
        assert!(shared.manifest("/repo").await.is_none());

        let mut manifest = RepoManifest::default();
        manifest.files.insert("a.rs".to_owned(), crate::model::FileHash("h".to_owned()));
        shared.commit_manifest("/repo", manifest.clone()).await;

        let read_back = shared.manifest("/repo").await.unwrap();
        assert_eq!(read_back.files.len(), 1);
    }
}
