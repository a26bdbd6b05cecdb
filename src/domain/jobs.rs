use super::media::{VideoMetadata, VideoSegment};
use serde::Serialize;

/// Lifecycle of a split or archive job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobState {
    pub phase: JobPhase,
    /// Percentage in `0..=100`
    pub progress: u8,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        self.phase == JobPhase::Running
    }

    pub fn begin(&mut self) {
        self.phase = JobPhase::Running;
        self.progress = 0;
    }

    /// Raises progress; a lower value than the current one is ignored.
    pub fn advance(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    pub fn succeed(&mut self) {
        self.phase = JobPhase::Succeeded;
        self.progress = 100;
    }

    /// Progress is left at its last observed value.
    pub fn fail(&mut self) {
        self.phase = JobPhase::Failed;
    }

    /// `round(done / total * 100)`
    pub fn progress_for(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
    }
}

/// Everything a session exposes to observers.
///
/// Mutated only inside the session's critical section; every mutation is
/// followed by publishing a clone of the whole value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub video: Option<VideoMetadata>,
    pub split: JobState,
    /// Ordered by segment index, appended while the split job runs
    pub segments: Vec<VideoSegment>,
    pub split_error: Option<String>,
    pub archive: JobState,
    pub archive_url: Option<String>,
    pub archive_error: Option<String>,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        self.split.is_running() || self.archive.is_running()
    }

    /// Drops everything derived from the current source.
    pub fn discard_outputs(&mut self) {
        self.segments.clear();
        self.split = JobState::default();
        self.split_error = None;
        self.archive = JobState::default();
        self.archive_url = None;
        self.archive_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounds() {
        assert_eq!(JobState::progress_for(2, 5), 40);
        assert_eq!(JobState::progress_for(1, 3), 33);
        assert_eq!(JobState::progress_for(2, 3), 67);
        assert_eq!(JobState::progress_for(7, 7), 100);
        assert_eq!(JobState::progress_for(1, 0), 0);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut state = JobState::default();
        state.begin();
        state.advance(60);
        state.advance(20);
        assert_eq!(state.progress, 60);
        state.advance(250);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn test_failure_keeps_progress() {
        let mut state = JobState::default();
        state.begin();
        state.advance(40);
        state.fail();
        assert_eq!(state.phase, JobPhase::Failed);
        assert_eq!(state.progress, 40);
    }

    #[test]
    fn test_restart_resets_progress() {
        let mut state = JobState {
            phase: JobPhase::Failed,
            progress: 80,
        };
        state.begin();
        assert!(state.is_running());
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&JobPhase::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
    }
}
