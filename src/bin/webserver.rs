// The daemon's entrypoint. Brings up logging and the HTTP/WebSocket router
// immediately; the coordinator itself (store subprocess, vector client,
// keyword index, embedding providers) is brought up lazily by `POST /init`
// per SPEC_FULL §4.5, so this binary's own startup is just router wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use codeindex_sidecar::config::Configuration;
use codeindex_sidecar::webserver::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let configuration = Configuration::parse();
    codeindex_sidecar::logging::install(&configuration);

    info!(port = configuration.port, host = %configuration.host, "starting daemon");

    let state = Arc::new(AppState::new(Arc::new(configuration.clone())));
    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", configuration.host, configuration.port).parse()?;

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
    if let Some(coordinator) = state.coordinator.load_full() {
        coordinator.shutdown().await;
    }
}
