//! Out-of-process engine adapters: `ffmpeg` for encoding, `ffprobe` for inspection.

use crate::config::EngineConfig;
use crate::domain::media::{format_size_mb, VideoMetadata};
use crate::domain::timecode::format_hms;
use crate::error::ProbeError;
use crate::ports::probe::MediaProbe;
use crate::ports::transcoder::{TranscodeRequest, Transcoder};
use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

pub struct FfmpegTranscoder {
    program: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegTranscoder {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            program: engine.ffmpeg_path.clone(),
            video_codec: engine.video_codec.clone(),
            audio_codec: engine.audio_codec.clone(),
        }
    }

    /// Seeking before `-i` resets the input clock to the seek point, and
    /// `-avoid_negative_ts make_zero` shifts whatever is left so the output
    /// starts at zero.
    pub fn command_args(&self, request: &TranscodeRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();

        args.push("-ss".into());
        args.push(format!("{:.6}", request.start).into());
        args.push("-i".into());
        args.push(request.source.clone().into_os_string());
        args.push("-t".into());
        args.push(format!("{:.6}", request.duration).into());
        args.push("-c:v".into());
        args.push(self.video_codec.clone().into());
        args.push("-c:a".into());
        args.push(self.audio_codec.clone().into());
        args.push("-threads".into());
        args.push(request.thread_budget.max(1).to_string().into());
        args.push("-avoid_negative_ts".into());
        args.push("make_zero".into());
        args.push(request.output.clone().into_os_string());

        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> io::Result<Output> {
        let args = self.command_args(request);
        tracing::debug!("{:?} {:?}", self.program, args);

        // A timed-out caller drops this future, which must take the child with it
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            program: engine.ffprobe_path.clone(),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path, display_name: &str) -> Result<VideoMetadata, ProbeError> {
        let output = Command::new(&self.program)
            .arg("-v")
            .arg("error")
            .arg("-show_format")
            .arg("-show_streams")
            .arg("-print_format")
            .arg("json")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let size_bytes = tokio::fs::metadata(path).await?.len();
        parse_probe_output(&output.stdout, path, display_name, size_bytes)
    }
}

/// Builds metadata from `ffprobe -print_format json` output.
pub fn parse_probe_output(
    stdout: &[u8],
    path: &Path,
    display_name: &str,
    size_bytes: u64,
) -> Result<VideoMetadata, ProbeError> {
    let v: Value = serde_json::from_slice(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;

    // ffprobe prints numbers as strings
    let duration = v
        .get("format")
        .and_then(|format| format.get("duration"))
        .and_then(|d| d.as_f64().or_else(|| d.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|d: &f64| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ProbeError::Parse("missing or non-positive duration".to_string()))?;

    let resolution = v
        .get("streams")
        .and_then(|streams| streams.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        })
        .and_then(|s| Some((s.get("width")?.as_u64()?, s.get("height")?.as_u64()?)))
        .map(|(w, h)| format!("{}x{}", w, h))
        .unwrap_or_else(|| String::from("0x0"));

    Ok(VideoMetadata {
        filename: display_name.to_string(),
        duration_raw: duration,
        duration_formatted: format_hms(duration),
        resolution,
        file_size_mb: format_size_mb(size_bytes),
        file_path: path.to_path_buf(),
    })
}
