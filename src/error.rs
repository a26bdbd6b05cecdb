//! Error taxonomy for the job engine.

use thiserror::Error;

/// Why a job command was refused or a job ended badly.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no source video is loaded")]
    NoVideo,

    #[error("a job is already running for this session")]
    Busy,

    #[error("there are no finished segments to archive")]
    NothingToArchive,

    #[error(transparent)]
    Transcode(#[from] TranscodeFailure),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// One segment's external encode did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("part {} (segment index {segment_index}) failed: {diagnostic}", .segment_index + 1)]
pub struct TranscodeFailure {
    pub segment_index: usize,
    /// Text the engine wrote to its error stream, or what went wrong launching it
    pub diagnostic: String,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive encoding failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive task aborted: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not run probe: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe failed: {0}")]
    Failed(String),

    #[error("unreadable probe output: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
