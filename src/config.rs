//! Configuration resolved once at process start.

use crate::error::ConfigError;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locations of the external engine binaries.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
}

/// Knobs applied to every split and archive job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSettings {
    /// Threads handed to each engine invocation
    pub thread_budget: usize,
    /// Deadline for a single segment; `None` waits forever
    pub segment_timeout: Option<Duration>,
    /// Delete the outputs of a split that failed midway
    pub cleanup_partial_output: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            thread_budget: default_thread_budget(),
            segment_timeout: None,
            cleanup_partial_output: false,
        }
    }
}

/// Configuration for the HTTP server binary.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory for uploads and every generated file
    pub upload_dir: PathBuf,
    /// Origin prepended to `/files/<name>`
    pub public_base_url: String,
    pub engine: EngineConfig,
    pub jobs: JobSettings,
}

impl AppConfig {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = var("ADDR").unwrap_or_else(|| String::from("127.0.0.1"));
        let port = var("PORT").unwrap_or_else(|| String::from("3000"));
        let upload_dir = PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| String::from("./uploads")));
        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", addr, port))
            .trim_end_matches('/')
            .to_string();

        let bundled_dir = PathBuf::from(var("FFMPEG_BUNDLED_DIR").unwrap_or_else(|| String::from("./bin")));
        let engine = EngineConfig {
            ffmpeg_path: resolve_binary("ffmpeg", var("FFMPEG_PATH"), &bundled_dir),
            ffprobe_path: resolve_binary("ffprobe", var("FFPROBE_PATH"), &bundled_dir),
            video_codec: var("VIDEO_CODEC").unwrap_or_else(|| String::from("libx264")),
            audio_codec: var("AUDIO_CODEC").unwrap_or_else(|| String::from("aac")),
        };

        let thread_budget = match var("THREAD_BUDGET") {
            Some(value) => parse_positive("THREAD_BUDGET", &value)?,
            None => default_thread_budget(),
        };
        let segment_timeout = match var("SEGMENT_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(
                parse_positive("SEGMENT_TIMEOUT_SECS", &value)? as u64,
            )),
            None => None,
        };
        let cleanup_partial_output = match var("CLEANUP_PARTIAL_OUTPUT") {
            Some(value) => parse_flag("CLEANUP_PARTIAL_OUTPUT", &value)?,
            None => false,
        };

        Ok(Self {
            addr,
            port,
            upload_dir,
            public_base_url,
            engine,
            jobs: JobSettings {
                thread_budget,
                segment_timeout,
                cleanup_partial_output,
            },
        })
    }
}

/// Half of the logical cores, never less than one.
pub fn default_thread_budget() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Picks a binary in this order: explicit path, `PATH` lookup, bundled
/// directory. Falls back to the bare name so a missing engine surfaces as a
/// spawn error on first use rather than at startup.
pub fn resolve_binary(name: &str, explicit: Option<String>, bundled_dir: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if let Ok(path) = which::which(name) {
        return path;
    }
    let bundled = bundled_dir.join(format!("{}{}", name, env::consts::EXE_SUFFIX));
    if bundled.is_file() {
        return bundled;
    }
    tracing::warn!("{} not found on PATH or in {:?}", name, bundled_dir);
    PathBuf::from(name)
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a positive integer",
            value: value.to_string(),
        }),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr, "127.0.0.1");
        assert_eq!(config.port, "3000");
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.public_base_url, "http://127.0.0.1:3000");
        assert_eq!(config.engine.video_codec, "libx264");
        assert_eq!(config.engine.audio_codec, "aac");
        assert_eq!(config.jobs.thread_budget, default_thread_budget());
        assert_eq!(config.jobs.segment_timeout, None);
        assert!(!config.jobs.cleanup_partial_output);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PUBLIC_BASE_URL", "https://clips.example.com/"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
            ("THREAD_BUDGET", "3"),
            ("SEGMENT_TIMEOUT_SECS", "90"),
            ("CLEANUP_PARTIAL_OUTPUT", "yes"),
            ("VIDEO_CODEC", "libx265"),
        ]))
        .unwrap();
        assert_eq!(config.public_base_url, "https://clips.example.com");
        assert_eq!(config.engine.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.engine.video_codec, "libx265");
        assert_eq!(config.jobs.thread_budget, 3);
        assert_eq!(config.jobs.segment_timeout, Some(Duration::from_secs(90)));
        assert!(config.jobs.cleanup_partial_output);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("PORT", "  "), ("THREAD_BUDGET", "")])).unwrap();
        assert_eq!(config.port, "3000");
        assert_eq!(config.jobs.thread_budget, default_thread_budget());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        for (key, value) in [("THREAD_BUDGET", "0"), ("THREAD_BUDGET", "many"), ("SEGMENT_TIMEOUT_SECS", "-5")] {
            let err = AppConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("CLEANUP_PARTIAL_OUTPUT", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("a boolean"));
    }

    #[test]
    fn test_thread_budget_default_is_at_least_one() {
        assert!(default_thread_budget() >= 1);
    }

    #[test]
    fn test_explicit_binary_wins() {
        let dir = tempdir().unwrap();
        let path = resolve_binary("ffmpeg", Some("/custom/ffmpeg".to_string()), dir.path());
        assert_eq!(path, PathBuf::from("/custom/ffmpeg"));
    }

    #[test]
    fn test_bundled_binary_is_the_fallback() {
        let dir = tempdir().unwrap();
        let name = "segsplit-engine-that-is-not-installed";
        let bundled = dir.path().join(format!("{}{}", name, env::consts::EXE_SUFFIX));
        std::fs::write(&bundled, b"").unwrap();

        assert_eq!(resolve_binary(name, None, dir.path()), bundled);
    }

    #[test]
    fn test_missing_binary_falls_back_to_name() {
        let dir = tempdir().unwrap();
        let name = "segsplit-engine-that-is-not-installed";
        assert_eq!(resolve_binary(name, None, dir.path()), PathBuf::from(name));
    }
}
