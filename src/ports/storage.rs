use std::path::PathBuf;

/// Shared output directory plus the URL scheme files are served under.
pub trait StoragePort: Send + Sync {
    /// Absolute location for a generated file
    fn output_path(&self, file_name: &str) -> PathBuf;

    /// Retrievable URL for a generated file
    fn public_url(&self, file_name: &str) -> String;
}
