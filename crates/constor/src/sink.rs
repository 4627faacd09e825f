use hashpub_protocol::ProgressMessage;
use tokio::sync::mpsc;
use tracing::debug;

/// Progress channel shared by producers and upload workers.
///
/// Sends never wait and never drop while the receiver is alive: one-off
/// notices (`Archive`, `ArchiveIndex`, start/done markers) have no later
/// message to replace them, so a slow reader only grows the backlog.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressMessage>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressMessage>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn send(&self, message: impl Into<ProgressMessage>) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(message.into()) {
            debug!(message = ?e.0, "progress receiver gone, dropping message");
        }
    }
}
