use crate::ports::storage::StoragePort;
use axum::body::Bytes;
use futures::{Stream, TryStreamExt};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;

const PREFIX_LEN: usize = 10;

/// The shared upload directory, which also holds every generated file.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Streams an upload to disk under a fresh unique name and returns its path.
    pub async fn store_upload<S, E>(&self, original_name: &str, stream: S) -> io::Result<PathBuf>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = self.root.join(unique_name(original_name));
        tracing::info!("Saving new upload to {:?}", path);

        if let Err(err) = stream_to_file(&path, stream).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(err);
        }
        Ok(path)
    }
}

impl StoragePort for LocalStorage {
    fn output_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    fn public_url(&self, file_name: &str) -> String {
        format!("{}/files/{}", self.base_url, file_name)
    }
}

/// `<10 random alphanumerics>_<sanitized original name>`
pub fn unique_name(original_name: &str) -> String {
    let prefix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PREFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, sanitize_file_name(original_name))
}

/// Keeps only the final path component and replaces anything outside
/// `[A-Za-z0-9._-]`, so the result can neither escape the upload directory
/// nor need escaping in a URL.
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = unsafe_chars.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        String::from("upload")
    } else {
        cleaned.to_string()
    }
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_upload() {
        let temp_dir = tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path(), "http://localhost:3000");

        type E = std::io::Error;
        let chunks = vec![
            Ok::<Bytes, E>(Bytes::from("Hello, ")),
            Ok::<Bytes, E>(Bytes::from("world!")),
        ];

        let path = storage.store_upload("clip.mp4", stream::iter(chunks)).await.unwrap();

        assert_eq!(path.parent().unwrap(), temp_dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_clip.mp4"), "{}", name);
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_store_upload_error_leaves_nothing_behind() {
        let temp_dir = tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path(), "http://localhost:3000");

        let failing = stream::iter(vec![Ok(Bytes::from("partial")), Err("Test error")]);
        let err = storage.store_upload("clip.mp4", failing).await.unwrap_err();

        assert_eq!(err.to_string(), "Test error");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unique_names_have_random_prefix() {
        let prefixed = Regex::new(r"^[A-Za-z0-9]{10}_movie\.mp4$").unwrap();
        let a = unique_name("movie.mp4");
        let b = unique_name("movie.mp4");
        assert!(prefixed.is_match(&a), "{}", a);
        assert!(prefixed.is_match(&b), "{}", b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\Users\me\clip.mov"), "clip.mov");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my holiday (1).mp4"), "my_holiday_1_.mp4");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".hidden.mp4"), "hidden.mp4");
    }

    #[test]
    fn test_public_url_scheme() {
        let storage = LocalStorage::new("/srv/uploads", "https://clips.example.com/");
        assert_eq!(
            storage.public_url("abc_part_001.mp4"),
            "https://clips.example.com/files/abc_part_001.mp4"
        );
        assert_eq!(
            storage.output_path("abc_part_001.mp4"),
            PathBuf::from("/srv/uploads/abc_part_001.mp4")
        );
    }
}
