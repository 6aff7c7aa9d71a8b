// A push channel of typed progress updates, per SPEC_FULL 9 ("Progress
// reporting is a push channel of typed frames, not a callback"). The
// coordinator's WebSocket loop is the primary consumer; tests use the
// in-memory recorder.

use async_trait::async_trait;

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, percent: u8);
}

/// Forwards percentages onto a `flume` channel, matching the bounded-channel
/// style already used for the background filesystem watcher.
pub struct ChannelProgressReporter {
    sender: flume::Sender<u8>,
}

impl ChannelProgressReporter {
    pub fn new(sender: flume::Sender<u8>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl ProgressReporter for ChannelProgressReporter {
    async fn report(&self, percent: u8) {
        let _ = self.sender.send_async(percent).await;
    }
}

#[cfg(test)]
pub struct RecordingProgressReporter {
    pub values: tokio::sync::Mutex<Vec<u8>>,
}

#[cfg(test)]
impl RecordingProgressReporter {
    pub fn new() -> Self {
        Self { values: tokio::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
#[async_trait]
impl ProgressReporter for RecordingProgressReporter {
    async fn report(&self, percent: u8) {
        self.values.lock().await.push(percent);
    }
}
