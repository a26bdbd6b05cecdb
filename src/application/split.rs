//! The split job: plan, encode every range in order, publish as it goes.

use super::invoker::transcode_segment;
use super::session::{SessionCore, SessionDeps};
use crate::domain::jobs::JobState;
use crate::domain::media::{segment_file_name, VideoMetadata, VideoSegment};
use crate::domain::plan::{plan, SegmentRange};
use crate::domain::timecode::format_hms;
use crate::error::{JobError, TranscodeFailure};
use crate::events::JobEventKind;
use std::path::Path;
use std::sync::Arc;

pub struct SplitController {
    core: Arc<SessionCore>,
    deps: SessionDeps,
}

/// A split job that has been admitted and marked running but not yet executed.
///
/// Dropping it without calling [`SplitRun::execute`] leaves the session
/// running, so callers either execute it or hand it to a supervised task.
#[must_use = "an admitted split stays running until executed"]
pub struct SplitRun {
    core: Arc<SessionCore>,
    deps: SessionDeps,
    video: VideoMetadata,
    ranges: Vec<SegmentRange>,
}

impl SplitController {
    pub(crate) fn new(core: Arc<SessionCore>, deps: SessionDeps) -> Self {
        Self { core, deps }
    }

    /// Validates and admits a split in one critical section.
    ///
    /// Rejections leave the session state exactly as it was.
    pub async fn begin(&self, segment_count: usize) -> Result<SplitRun, JobError> {
        let (video, ranges) = self
            .core
            .mutate(|state| {
                if state.is_busy() {
                    return Err(JobError::Busy);
                }
                let video = state.video.clone().ok_or(JobError::NoVideo)?;
                let ranges = plan(video.duration_raw, segment_count)?;
                if !video.file_path.is_file() {
                    return Err(JobError::InvalidInput(format!(
                        "source file {:?} does not exist",
                        video.file_path
                    )));
                }

                state.split.begin();
                state.segments.clear();
                state.split_error = None;
                Ok((video, ranges))
            })
            .await
            .map_err(|e| {
                tracing::warn!(session = %self.core.id(), "split rejected: {}", e);
                e
            })?;

        tracing::info!(
            session = %self.core.id(),
            "splitting {:?} ({}) into {} segments",
            video.filename,
            video.duration_formatted,
            ranges.len()
        );

        Ok(SplitRun {
            core: self.core.clone(),
            deps: self.deps.clone(),
            video,
            ranges,
        })
    }
}

impl SplitRun {
    /// Encodes the ranges one at a time, in index order, and stops at the
    /// first failure.
    pub async fn execute(self) -> Result<Vec<VideoSegment>, JobError> {
        let stem = self.video.stem();
        let total = self.ranges.len();
        let settings = &self.deps.settings;

        for range in &self.ranges {
            let file_name = segment_file_name(&stem, range.index);
            let output = self.deps.storage.output_path(&file_name);

            tracing::debug!(
                session = %self.core.id(),
                "segment {}/{}: {:.3}s..{:.3}s -> {:?}",
                range.index + 1,
                total,
                range.start,
                range.end,
                output
            );

            if let Err(failure) = transcode_segment(
                self.deps.transcoder.as_ref(),
                &self.video.file_path,
                range,
                &output,
                settings.thread_budget,
                settings.segment_timeout,
            )
            .await
            {
                self.fail(&failure, &output).await;
                return Err(failure.into());
            }

            let segment = VideoSegment {
                download_url: self.deps.storage.public_url(&file_name),
                filename: file_name,
                duration_formatted: format_hms(range.duration()),
                file_path: output,
            };
            let progress = JobState::progress_for(range.index + 1, total);
            self.core
                .mutate(|state| {
                    state.segments.push(segment);
                    state.split.advance(progress);
                })
                .await;
            self.core.publish(JobEventKind::SplitProgress { progress });
        }

        let segments = self
            .core
            .mutate(|state| {
                state.split.succeed();
                // Any archive built before now describes the previous run
                state.archive = JobState::default();
                state.archive_url = None;
                state.archive_error = None;
                state.segments.clone()
            })
            .await;

        tracing::info!(session = %self.core.id(), "video split into {} segments", segments.len());
        self.core.publish(JobEventKind::SplitSucceeded {
            segments: segments.len(),
        });
        Ok(segments)
    }

    async fn fail(&self, failure: &TranscodeFailure, failed_output: &Path) {
        tracing::error!(session = %self.core.id(), "error splitting video: {}", failure);

        let cleanup = self.deps.settings.cleanup_partial_output;
        if cleanup {
            let produced = self.core.snapshot().segments;
            for path in produced
                .iter()
                .map(|s| s.file_path.as_path())
                .chain(std::iter::once(failed_output))
            {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("could not remove partial output {:?}: {}", path, e);
                    }
                }
            }
        }

        let message = failure.to_string();
        self.core
            .mutate(|state| {
                state.split.fail();
                state.split_error = Some(message.clone());
                if cleanup {
                    state.segments.clear();
                }
            })
            .await;
        self.core.publish(JobEventKind::SplitFailed {
            segment_index: failure.segment_index,
            message,
        });
    }
}
