// Lifecycle of the embedded vector database subprocess. Grounded on the
// teacher's `semantic_search::qdrant_process::QdrantServerProcess`: detect an
// already-running instance, otherwise lay down a generated config and spawn
// it, raising the process file-descriptor limit on unix first.

use std::fs::{create_dir_all, write};
use std::process::Child;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::config::Configuration;

const QDRANT_CONFIG_TEMPLATE: &str = r#"
storage:
  storage_path: {storage}
  snapshots_path: {snapshots}
service:
  host: 127.0.0.1
  http_port: 6333
  grpc_port: 6334
"#;

pub struct ChunkStoreSubprocess {
    child: Option<Child>,
    _config: Arc<Configuration>,
}

impl Drop for ChunkStoreSubprocess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
        }
    }
}

impl ChunkStoreSubprocess {
    /// If a store is already reachable at the configured gRPC endpoint, adopt
    /// it instead of spawning a second copy.
    pub async fn initialize(config: Arc<Configuration>) -> Result<Self> {
        if qdrant_reachable().await {
            return Ok(Self {
                child: None,
                _config: config,
            });
        }

        let storage_dir = config.store_storage_dir();
        let qdrant_config_dir = storage_dir.join("config");
        create_dir_all(&qdrant_config_dir).context("creating qdrant config dir")?;

        write(
            qdrant_config_dir.join("config.yaml"),
            QDRANT_CONFIG_TEMPLATE
                .replace("{storage}", &storage_dir.join("storage").to_string_lossy())
                .replace(
                    "{snapshots}",
                    &storage_dir.join("snapshots").to_string_lossy(),
                ),
        )
        .context("writing qdrant config")?;

        let binary = locate_qdrant_binary()
            .ok_or_else(|| anyhow!("no `qdrant` binary found on PATH or next to the executable"))?;
        let child = Some(spawn(&binary, &storage_dir)?);

        Ok(Self {
            child,
            _config: config,
        })
    }

    /// Attempts to stop the subprocess, waiting up to `grace` before giving
    /// up and leaving it for the OS to reap.
    pub async fn stop(&mut self, grace: std::time::Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let _ = child.kill();
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => {
                    if tokio::time::Instant::now() >= deadline {
                        return;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
            }
        }
    }
}

fn locate_qdrant_binary() -> Option<std::path::PathBuf> {
    let name = if cfg!(windows) { "qdrant.exe" } else { "qdrant" };
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    which_on_path(name)
}

fn which_on_path(name: &str) -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
fn spawn(binary: &std::path::Path, storage_dir: &std::path::Path) -> Result<Child> {
    use nix::sys::resource::{getrlimit, setrlimit, Resource};
    use std::process::Command;

    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((_, hard)) if hard < 2048 => {
            if let Err(err) = setrlimit(Resource::RLIMIT_NOFILE, 1024, 2048) {
                tracing::warn!(?err, "failed to raise rlimit/nofile before starting the store");
            }
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(?err, "failed to read rlimit/nofile"),
    }

    Command::new(binary)
        .arg("--config-path")
        .arg(storage_dir.join("config").join("config.yaml"))
        .current_dir(storage_dir)
        .spawn()
        .context("spawning the qdrant subprocess")
}

#[cfg(windows)]
fn spawn(binary: &std::path::Path, storage_dir: &std::path::Path) -> Result<Child> {
    use std::os::windows::process::CommandExt;
    use std::process::Command;

    Command::new(binary)
        .arg("--config-path")
        .arg(storage_dir.join("config").join("config.yaml"))
        .current_dir(storage_dir)
        .creation_flags(0x08000000)
        .spawn()
        .context("spawning the qdrant subprocess")
}

async fn qdrant_reachable() -> bool {
    tokio::net::TcpStream::connect("127.0.0.1:6334")
        .await
        .is_ok()
}

/// Blocks (with backoff) until the store answers its health check, used right
/// after a fresh spawn before the first client operation.
pub async fn wait_for_store_ready(client: &qdrant_client::client::QdrantClient) {
    for _ in 0..60 {
        if client.health_check().await.is_ok() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
    tracing::error!("store subprocess never became healthy");
}
