//! Per-user sessions: one video, one split job, one archive job.

use super::archive::{ArchiveBuilder, ArchiveRun};
use super::split::{SplitController, SplitRun};
use crate::config::JobSettings;
use crate::domain::jobs::SessionState;
use crate::domain::media::{VideoMetadata, VideoSegment};
use crate::domain::plan::{plan, SegmentRange};
use crate::error::JobError;
use crate::events::{EventHub, JobEvent, JobEventKind};
use crate::ports::storage::StoragePort;
use crate::ports::transcoder::Transcoder;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Collaborators shared by every job of every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub transcoder: Arc<dyn Transcoder>,
    pub storage: Arc<dyn StoragePort>,
    pub settings: JobSettings,
}

/// The state every job of one session reads and writes.
pub struct SessionCore {
    id: Uuid,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<SessionState>,
    events: EventHub,
}

impl SessionCore {
    fn new(id: Uuid, events: EventHub) -> Self {
        let (snapshots, _) = watch::channel(SessionState::default());
        Self {
            id,
            state: Mutex::new(SessionState::default()),
            snapshots,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs `f` as one critical section and publishes the resulting state
    /// before the lock is released, so observers see mutations in order.
    pub(crate) async fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        self.snapshots.send_replace(state.clone());
        result
    }

    /// Latest published state; never waits on a running mutation.
    pub fn snapshot(&self) -> SessionState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshots.subscribe()
    }

    pub(crate) fn publish(&self, kind: JobEventKind) {
        self.events.publish(self.id, kind);
    }
}

pub struct Session {
    core: Arc<SessionCore>,
    split: SplitController,
    archive: ArchiveBuilder,
}

impl Session {
    pub fn new(id: Uuid, deps: SessionDeps, events: EventHub) -> Self {
        let core = Arc::new(SessionCore::new(id, events));
        Self {
            split: SplitController::new(core.clone(), deps.clone()),
            archive: ArchiveBuilder::new(core.clone(), deps),
            core,
        }
    }

    pub fn id(&self) -> Uuid {
        self.core.id()
    }

    /// Replaces the source video and returns the one it replaced.
    ///
    /// Outputs of the previous source are discarded from the session.
    pub async fn set_video(&self, video: VideoMetadata) -> Result<Option<VideoMetadata>, JobError> {
        tracing::info!(session = %self.id(), "new source {:?} ({})", video.filename, video.duration_formatted);
        self.core
            .mutate(|state| {
                if state.is_busy() {
                    return Err(JobError::Busy);
                }
                state.discard_outputs();
                Ok(state.video.replace(video))
            })
            .await
    }

    pub async fn clear_video(&self) -> Result<Option<VideoMetadata>, JobError> {
        self.core
            .mutate(|state| {
                if state.is_busy() {
                    return Err(JobError::Busy);
                }
                state.discard_outputs();
                Ok(state.video.take())
            })
            .await
    }

    /// Ranges a split of the current source into `segment_count` parts would use.
    pub fn preview_split(&self, segment_count: usize) -> Result<Vec<SegmentRange>, JobError> {
        let video = self.snapshot().video.ok_or(JobError::NoVideo)?;
        plan(video.duration_raw, segment_count)
    }

    pub async fn begin_split(&self, segment_count: usize) -> Result<SplitRun, JobError> {
        self.split.begin(segment_count).await
    }

    /// Runs a whole split on the calling task.
    pub async fn start_split(&self, segment_count: usize) -> Result<Vec<VideoSegment>, JobError> {
        self.begin_split(segment_count).await?.execute().await
    }

    /// Admits a split and runs it on its own task.
    ///
    /// Admission errors come back immediately; job outcomes are only visible
    /// through snapshots and events.
    pub async fn spawn_split(&self, segment_count: usize) -> Result<JoinHandle<()>, JobError> {
        let run = self.begin_split(segment_count).await?;
        let core = self.core.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = tokio::spawn(run.execute()).await {
                tracing::error!(session = %core.id(), "split task aborted: {}", e);
                let message = String::from("split job aborted unexpectedly");
                core.mutate(|state| {
                    if state.split.is_running() {
                        state.split.fail();
                        state.split_error = Some(message);
                    }
                })
                .await;
            }
        }))
    }

    pub async fn begin_archive(&self) -> Result<ArchiveRun, JobError> {
        self.archive.begin().await
    }

    pub async fn start_archive(&self) -> Result<String, JobError> {
        self.begin_archive().await?.execute().await
    }

    pub async fn spawn_archive(&self) -> Result<JoinHandle<()>, JobError> {
        let run = self.begin_archive().await?;
        let core = self.core.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = tokio::spawn(run.execute()).await {
                tracing::error!(session = %core.id(), "archive task aborted: {}", e);
                let message = String::from("Failed to create ZIP archive");
                core.mutate(|state| {
                    if state.archive.is_running() {
                        state.archive.fail();
                        state.archive_error = Some(message);
                    }
                })
                .await;
            }
        }))
    }

    pub fn snapshot(&self) -> SessionState {
        self.core.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.core.subscribe()
    }

    /// Events of every session sharing this hub.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.core.events.subscribe()
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    deps: SessionDeps,
    events: EventHub,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps, events: EventHub) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
            events,
        }
    }

    pub async fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, self.deps.clone(), self.events.clone()));
        self.sessions.write().await.insert(id, session.clone());
        tracing::info!(session = %id, "session created");
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }
}
