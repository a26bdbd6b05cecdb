//! The archive job: bundle a finished split's files into one ZIP.

use super::session::{SessionCore, SessionDeps};
use crate::domain::jobs::JobPhase;
use crate::domain::media::{archive_file_name, VideoSegment};
use crate::error::{ArchiveError, JobError};
use crate::events::JobEventKind;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub struct ArchiveBuilder {
    core: Arc<SessionCore>,
    deps: SessionDeps,
}

/// An admitted archive job, already marked running.
#[must_use = "an admitted archive stays running until executed"]
pub struct ArchiveRun {
    core: Arc<SessionCore>,
    deps: SessionDeps,
    stem: String,
    segments: Vec<VideoSegment>,
}

impl ArchiveBuilder {
    pub(crate) fn new(core: Arc<SessionCore>, deps: SessionDeps) -> Self {
        Self { core, deps }
    }

    /// Admits an archive job over the published segments of a finished split.
    pub async fn begin(&self) -> Result<ArchiveRun, JobError> {
        let (stem, segments) = self
            .core
            .mutate(|state| {
                if state.is_busy() {
                    return Err(JobError::Busy);
                }
                if state.split.phase != JobPhase::Succeeded || state.segments.is_empty() {
                    return Err(JobError::NothingToArchive);
                }
                let stem = state
                    .video
                    .as_ref()
                    .map(|video| video.stem())
                    .unwrap_or_else(|| String::from("video"));

                state.archive.begin();
                state.archive_url = None;
                state.archive_error = None;
                Ok((stem, state.segments.clone()))
            })
            .await
            .map_err(|e| {
                tracing::warn!(session = %self.core.id(), "archive rejected: {}", e);
                e
            })?;

        Ok(ArchiveRun {
            core: self.core.clone(),
            deps: self.deps.clone(),
            stem,
            segments,
        })
    }
}

impl ArchiveRun {
    /// Writes the archive and returns its public URL.
    pub async fn execute(self) -> Result<String, JobError> {
        let file_name = archive_file_name(&self.stem);
        let target = self.deps.storage.output_path(&file_name);
        let members: Vec<(PathBuf, String)> = self
            .segments
            .iter()
            .map(|segment| (segment.file_path.clone(), segment.filename.clone()))
            .collect();

        tracing::info!(session = %self.core.id(), "creating ZIP archive {:?}", target);

        let result = tokio::task::spawn_blocking(move || write_archive(&target, &members))
            .await
            .map_err(|e| ArchiveError::Join(e.to_string()))
            .and_then(|written| written);

        match result {
            Ok(files) => {
                let url = self.deps.storage.public_url(&file_name);
                self.core
                    .mutate(|state| {
                        state.archive.succeed();
                        state.archive_url = Some(url.clone());
                    })
                    .await;
                self.core.publish(JobEventKind::ArchiveReady {
                    url: url.clone(),
                    files,
                });
                Ok(url)
            }
            Err(e) => {
                tracing::error!(session = %self.core.id(), "error creating ZIP: {}", e);
                let message = String::from("Failed to create ZIP archive");
                self.core
                    .mutate(|state| {
                        state.archive.fail();
                        state.archive_error = Some(message.clone());
                    })
                    .await;
                self.core.publish(JobEventKind::ArchiveFailed { message });
                Err(e.into())
            }
        }
    }
}

/// Writes `members` (path on disk, name inside the archive) into a ZIP at
/// `target`, replacing any previous file, and returns how many were added.
///
/// Members missing on disk are skipped. The archive is assembled in a
/// temporary file next to `target` and only renamed into place once complete.
pub fn write_archive(target: &Path, members: &[(PathBuf, String)]) -> Result<usize, ArchiveError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let mut added = 0;

    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        // Segments are already compressed video
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (path, name) in members {
            let mut file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!("skipping missing segment {:?}", path);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let large = file.metadata()?.len() >= u32::MAX as u64;
            zip.start_file(name.as_str(), options.large_file(large))?;
            io::copy(&mut file, &mut zip)?;
            added += 1;
        }

        zip.finish()?;
    }

    temp.persist(target).map_err(|e| e.error)?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names_in(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_members_use_bare_names() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deep").join("er");
        fs::create_dir_all(&nested).unwrap();
        let part = nested.join("a_part_001.mp4");
        fs::write(&part, b"one").unwrap();

        let target = dir.path().join("a_all_parts.zip");
        let added = write_archive(&target, &[(part, "a_part_001.mp4".to_string())]).unwrap();

        assert_eq!(added, 1);
        assert_eq!(names_in(&target), vec!["a_part_001.mp4"]);

        let mut archive = zip::ZipArchive::new(File::open(&target).unwrap()).unwrap();
        let mut entry = archive.by_name("a_part_001.mp4").unwrap();
        let mut body = String::new();
        io::Read::read_to_string(&mut entry, &mut body).unwrap();
        assert_eq!(body, "one");
    }

    #[test]
    fn test_missing_members_are_skipped() {
        let dir = tempdir().unwrap();
        let mut members = Vec::new();
        for i in 1..=4 {
            let name = format!("a_part_{:03}.mp4", i);
            let path = dir.path().join(&name);
            if i != 3 {
                fs::write(&path, b"data").unwrap();
            }
            members.push((path, name));
        }

        let target = dir.path().join("a_all_parts.zip");
        assert_eq!(write_archive(&target, &members).unwrap(), 3);
        assert_eq!(
            names_in(&target),
            vec!["a_part_001.mp4", "a_part_002.mp4", "a_part_004.mp4"]
        );
    }

    #[test]
    fn test_rerun_overwrites_previous_archive() {
        let dir = tempdir().unwrap();
        let one = dir.path().join("one.mp4");
        let two = dir.path().join("two.mp4");
        fs::write(&one, b"1").unwrap();
        fs::write(&two, b"2").unwrap();
        let target = dir.path().join("x_all_parts.zip");

        write_archive(&target, &[(one.clone(), "one.mp4".into()), (two, "two.mp4".into())]).unwrap();
        write_archive(&target, &[(one, "one.mp4".into())]).unwrap();

        assert_eq!(names_in(&target), vec!["one.mp4"]);
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let part = dir.path().join("p.mp4");
        fs::write(&part, b"data").unwrap();
        // A directory squatting on the target name makes the final rename fail
        let target = dir.path().join("p_all_parts.zip");
        fs::create_dir(&target).unwrap();

        let result = write_archive(&target, &[(part, "p.mp4".into())]);

        assert!(matches!(result, Err(ArchiveError::Io(_))));
        let mut leftovers: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        leftovers.sort();
        assert_eq!(leftovers, vec!["p.mp4", "p_all_parts.zip"]);
        assert!(target.is_dir());
    }
}
