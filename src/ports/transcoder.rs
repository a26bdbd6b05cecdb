use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Output;

/// Everything the engine needs to cut one range out of a source.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    /// Seek offset into the source, in seconds
    pub start: f64,
    /// Seconds to encode from `start`
    pub duration: f64,
    pub output: PathBuf,
    /// Cap on the engine's internal threads
    pub thread_budget: usize,
}

/// Runs the external transcoding engine once.
///
/// Implementations return the finished process output; interpreting the exit
/// status is left to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, request: &TranscodeRequest) -> io::Result<Output>;
}
