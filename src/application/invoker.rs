use crate::domain::plan::SegmentRange;
use crate::error::TranscodeFailure;
use crate::ports::transcoder::{TranscodeRequest, Transcoder};
use std::path::Path;
use std::time::Duration;

/// Encodes `range` of `source` into `output` through one engine run.
///
/// Success means exit status zero and nothing else; the output file is not
/// inspected. Launch errors, non-zero exits and an expired `timeout` all come
/// back as a [`TranscodeFailure`] for `range.index`.
pub async fn transcode_segment(
    transcoder: &dyn Transcoder,
    source: &Path,
    range: &SegmentRange,
    output: &Path,
    thread_budget: usize,
    timeout: Option<Duration>,
) -> Result<(), TranscodeFailure> {
    let request = TranscodeRequest {
        source: source.to_path_buf(),
        start: range.start,
        duration: range.duration(),
        output: output.to_path_buf(),
        thread_budget,
    };
    let failure = |diagnostic: String| TranscodeFailure {
        segment_index: range.index,
        diagnostic,
    };

    let run = transcoder.transcode(&request);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| failure(format!("timed out after {}s", limit.as_secs_f64())))?,
        None => run.await,
    };

    let output = result.map_err(|e| failure(format!("could not start transcoding engine: {}", e)))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(failure(if stderr.is_empty() {
        format!("transcoding engine exited with {}", output.status)
    } else {
        stderr
    }))
}
