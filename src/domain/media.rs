use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Snapshot of an uploaded source, captured once when the upload completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Name the file was uploaded under
    pub filename: String,
    /// Duration in seconds, the source of truth for all range math
    pub duration_raw: f64,
    pub duration_formatted: String,
    /// `WIDTHxHEIGHT`
    pub resolution: String,
    /// Size in MB with one decimal, display only
    pub file_size_mb: String,
    /// Where the source is stored on disk
    pub file_path: PathBuf,
}

impl VideoMetadata {
    /// Stem of the stored source file, used to name every derived output.
    pub fn stem(&self) -> String {
        file_stem(&self.file_path)
    }
}

/// One successfully produced output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub filename: String,
    pub duration_formatted: String,
    pub file_path: PathBuf,
    pub download_url: String,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("video")
        .to_string()
}

/// `<stem>_part_<NNN>.mp4`, where `NNN` is the 1-based index padded to three digits.
pub fn segment_file_name(stem: &str, index: usize) -> String {
    format!("{}_part_{:03}.mp4", stem, index + 1)
}

/// `<stem>_all_parts.zip`
pub fn archive_file_name(stem: &str) -> String {
    format!("{}_all_parts.zip", stem)
}

/// Human readable size in megabytes with one decimal.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1024.0 * 1024.0))
}
