//! Job notifications fanned out to whoever listens.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    SplitProgress { progress: u8 },
    SplitSucceeded { segments: usize },
    SplitFailed { segment_index: usize, message: String },
    ArchiveReady { url: String, files: usize },
    ArchiveFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub session: Uuid,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<JobEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        // Slow listeners lag and skip rather than hold up a job
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Returns how many listeners received the event; zero is not an error.
    pub fn publish(&self, session: Uuid, kind: JobEventKind) -> usize {
        self.sender.send(JobEvent { session, kind }).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every event published on `hub` until the hub is dropped.
pub fn spawn_logger(hub: &EventHub) -> tokio::task::JoinHandle<()> {
    let mut rx = hub.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event logger skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &JobEvent) {
    let session = event.session;
    match &event.kind {
        JobEventKind::SplitProgress { progress } => {
            tracing::debug!(%session, progress, "split progress");
        }
        JobEventKind::SplitSucceeded { segments } => {
            tracing::info!(%session, segments, "video split successfully");
        }
        JobEventKind::SplitFailed {
            segment_index,
            message,
        } => {
            tracing::error!(%session, segment_index, "error splitting video: {}", message);
        }
        JobEventKind::ArchiveReady { url, files } => {
            tracing::info!(%session, files, "ZIP archive created at {}", url);
        }
        JobEventKind::ArchiveFailed { message } => {
            tracing::error!(%session, "failed to create ZIP archive: {}", message);
        }
    }
}
