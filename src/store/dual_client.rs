// The store's dual sync/async client abstraction plus its liveness
// heartbeat. Grounded on the teacher's `semantic_search::client::SemanticClient`
// and `qdrant_process::wait_for_qdrant`, generalized per SPEC_FULL 4.1: one
// `QdrantClient` handle reused for both call sites, the "sync" consumer being
// a `block_in_place` adapter rather than a second connection pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use qdrant_client::client::{QdrantClient, QdrantClientConfig};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Configuration;
use crate::error::{Error, Result};

/// Shared, swappable handle to the vector store connection. The heartbeat
/// task replaces the inner `QdrantClient` atomically on reconnect; readers
/// never block on it.
pub struct StoreClient {
    inner: ArcSwap<QdrantClient>,
    live: AtomicBool,
    reconnect_guard: AsyncMutex<()>,
    url: String,
}

impl StoreClient {
    pub async fn connect(config: &Configuration) -> Result<Self> {
        let url = config
            .store_grpc_url
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:6334".to_owned());
        let client = build_client(&url)?;
        Ok(Self {
            inner: ArcSwap::from_pointee(client),
            live: AtomicBool::new(true),
            reconnect_guard: AsyncMutex::new(()),
            url,
        })
    }

    /// The async handle; every suspending store operation goes through this.
    pub fn async_handle(&self) -> Arc<QdrantClient> {
        self.inner.load_full()
    }

    /// A blocking adapter over the async client, for the rare call site that
    /// cannot itself be async (the teacher's own reason for keeping a "sync"
    /// client around at all).
    pub fn block_on<F, T>(&self, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn mark_down(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// Idempotent: two concurrent callers collapse onto one reconnect attempt
    /// via `reconnect_guard`.
    pub async fn reconnect(&self) -> Result<()> {
        let _permit = self.reconnect_guard.lock().await;
        if self.live.load(Ordering::SeqCst) {
            return Ok(());
        }
        match build_client(&self.url) {
            Ok(client) => {
                self.inner.store(Arc::new(client));
                self.live.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn build_client(url: &str) -> Result<QdrantClient> {
    QdrantClient::new(Some(QdrantClientConfig::from_url(url)))
        .map_err(|err| Error::StoreUnavailable(err.to_string()))
}

/// Probes readiness every `interval`; on failure marks the client down so the
/// next request reconnects. Never panics out into its spawning task.
pub async fn heartbeat_loop(client: Arc<StoreClient>, interval: Duration, grace: Duration) {
    let mut consecutive_failures: u32 = 0;
    loop {
        tokio::time::sleep(interval).await;
        let handle = client.async_handle();
        match handle.health_check().await {
            Ok(_) => {
                consecutive_failures = 0;
            }
            Err(err) => {
                consecutive_failures += 1;
                tracing::warn!(?err, consecutive_failures, "store heartbeat failed");
                client.mark_down();
                let elapsed = interval.saturating_mul(consecutive_failures);
                if elapsed >= grace {
                    tracing::error!("store heartbeat red past the grace window, forcing reconnect");
                }
                if client.reconnect().await.is_err() {
                    continue;
                }
            }
        }
    }
}
