//! Uniform time-range planning for a split job.

use crate::error::JobError;
use serde::Serialize;

/// Smallest accepted segment count.
pub const MIN_SEGMENTS: usize = 1;
/// Largest accepted segment count.
pub const MAX_SEGMENTS: usize = 20;

/// One contiguous slice of the source, `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentRange {
    /// 0-based position in the plan
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl SegmentRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Checks a requested segment count against the accepted bounds.
pub fn validate_count(count: usize) -> Result<(), JobError> {
    if (MIN_SEGMENTS..=MAX_SEGMENTS).contains(&count) {
        Ok(())
    } else {
        Err(JobError::InvalidInput(format!(
            "segment count must be between {} and {}, got {}",
            MIN_SEGMENTS, MAX_SEGMENTS, count
        )))
    }
}

/// Splits `total_duration` seconds into `count` equal ranges.
///
/// Range `i` covers `[i * len, min((i + 1) * len, total))` with
/// `len = total / count`. Neighbouring ranges share the exact same boundary
/// value and the last range always ends at `total_duration`, whatever drift the
/// multiplication accumulated.
pub fn plan(total_duration: f64, count: usize) -> Result<Vec<SegmentRange>, JobError> {
    validate_count(count)?;
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(JobError::InvalidInput(format!(
            "video duration must be positive, got {}",
            total_duration
        )));
    }

    let length = total_duration / count as f64;
    let boundary = |i: usize| {
        if i == count {
            total_duration
        } else {
            (i as f64 * length).min(total_duration)
        }
    };

    Ok((0..count)
        .map(|index| SegmentRange {
            index,
            start: boundary(index),
            end: boundary(index + 1),
        })
        .collect())
}
