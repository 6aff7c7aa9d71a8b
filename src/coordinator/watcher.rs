// Optional background file watcher: debounces filesystem change events for
// a repository so a caller can trigger opportunistic re-indexing without
// polling the manifest on a fixed timer. Grounded on the teacher's
// `bg_poll::background_polling::Poller`/`debounced_events` (notify-debouncer
// with content comparison, a backoff ladder of poll intervals, jitter to
// avoid thundering-herd re-index storms across many watched repos).
//
// Per SPEC_FULL §4.5, this is an optional feature the coordinator exposes;
// the core streaming-job contract (`/v1/update_chunks`) never depends on it.

use std::path::Path;
use std::time::Duration;

use notify_debouncer_mini::notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config, DebounceEventResult, Debouncer};
use rand::{distributions::Uniform, thread_rng, Rng};
use tracing::{debug, error};

use crate::error::{Error, Result};

const POLL_INTERVAL_LADDER: &[Duration] = &[
    Duration::from_secs(60),
    Duration::from_secs(3 * 60),
    Duration::from_secs(10 * 60),
    Duration::from_secs(20 * 60),
    Duration::from_secs(30 * 60),
];

/// Owns a debounced filesystem watcher for one repository path; dropping it
/// stops the watch. Change events are delivered on `changes`, coalesced by
/// the debouncer so a burst of saves produces one signal.
pub struct RepoWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    changes: flume::Receiver<()>,
    rung: usize,
}

impl RepoWatcher {
    /// Starts watching `repo_path` recursively. Fails if the path doesn't
    /// exist or can't be watched (permissions, inotify exhaustion).
    pub fn start(repo_path: &Path) -> Result<Self> {
        let (tx, rx) = flume::bounded(16);
        let mut debouncer = new_debouncer(tx);
        debouncer
            .watcher()
            .watch(repo_path, RecursiveMode::Recursive)
            .map_err(|e| Error::Internal(anyhow::anyhow!("watching {}: {e}", repo_path.display())))?;

        Ok(Self { _debouncer: debouncer, changes: rx, rung: 0 })
    }

    /// Awaits the next coalesced change signal, draining any further events
    /// that arrived while this call was pending so a burst of saves resolves
    /// to a single wakeup.
    pub async fn next_change(&mut self) {
        let _ = self.changes.recv_async().await;
        let _ = self.changes.drain().collect::<Vec<_>>();
        self.rung = 0;
    }

    /// Backs off one rung on the poll-interval ladder; called when a poll
    /// found nothing new to index.
    pub fn backoff(&mut self) -> Duration {
        self.rung = (self.rung + 1).min(POLL_INTERVAL_LADDER.len() - 1);
        self.interval()
    }

    fn interval(&self) -> Duration {
        POLL_INTERVAL_LADDER[self.rung]
    }

    /// The current interval plus jitter, so many watched repos polling on
    /// the same ladder rung don't all wake at once.
    pub fn jittered_interval(&self) -> Duration {
        let base = self.interval();
        let jitter = thread_rng().sample(Uniform::new(10, 30 + base.as_secs() / 2));
        base + Duration::from_secs(jitter)
    }
}

fn new_debouncer(tx: flume::Sender<()>) -> Debouncer<RecommendedWatcher> {
    let notify_config: NotifyConfig = Default::default();
    let config = Config::default().with_timeout(Duration::from_secs(5)).with_notify_config(notify_config.with_compare_contents(true));

    new_debouncer_opt(config, move |event: DebounceEventResult| match event {
        Ok(events) if !events.is_empty() => {
            if let Err(e) = tx.send(()) {
                error!(error = %e, "repo watcher channel closed");
            }
        }
        Ok(_) => debug!("debouncer woke with no events"),
        Err(err) => error!(?err, "repo watcher error"),
    })
    .expect("new_debouncer_opt to build a watcher")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_ladder_is_monotonically_increasing() {
        for pair in POLL_INTERVAL_LADDER.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[tokio::test]
    async fn watching_a_missing_path_fails_cleanly() {
        let result = RepoWatcher::start(Path::new("/does/not/exist/at/all"));
        assert!(result.is_err());
    }
}
