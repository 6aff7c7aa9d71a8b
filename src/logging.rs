// Installed once per process via a `OnceCell` guard, matching the teacher's
// `Application::install_logging` / `tracing_subscribe` split.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*};

use crate::config::Configuration;

static LOGGER_INSTALLED: OnceCell<bool> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

pub fn install(config: &Configuration) {
    if let Some(true) = LOGGER_INSTALLED.get() {
        return;
    }

    if !tracing_subscribe(config) {
        eprintln!("failed to install tracing subscriber, there's probably one already");
    }

    if color_eyre::install().is_err() {
        eprintln!("failed to install color-eyre, oh well");
    }

    LOGGER_INSTALLED.set(true).ok();
}

fn tracing_subscribe(config: &Configuration) -> bool {
    let env_filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "codeindex-sidecar.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOGGER_GUARD.set(guard);

    let log_writer_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
    let stdout_layer = fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter_layer)
        .with(log_writer_layer)
        .with(stdout_layer)
        .try_init()
        .is_ok()
}
