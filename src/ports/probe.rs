use crate::domain::media::VideoMetadata;
use crate::error::ProbeError;
use async_trait::async_trait;
use std::path::Path;

/// Inspects a stored upload once and describes it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path, display_name: &str) -> Result<VideoMetadata, ProbeError>;
}
