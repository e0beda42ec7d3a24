//! FFmpeg media encoder.
//!
//! Muxes one still image with one narration track into an H.264/AAC MP4, or
//! re-packages a bare narration track as MP3. Every call works inside its own
//! temporary directory under [`EncoderConfig::work_dir`]; the directory is
//! removed when the call returns, whether it succeeded, failed or timed out.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::providers::MediaEncoder;
use crate::subprocess::{run_command, CommandError};

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("ffmpeg timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("ffmpeg produced no output")]
    EmptyOutput,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<CommandError> for FfmpegError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Spawn(e) => FfmpegError::NotFound(e),
            CommandError::Io(e) => FfmpegError::IoError(e),
            CommandError::Timeout { elapsed_ms } => FfmpegError::Timeout { elapsed_ms },
        }
    }
}

/// Encoder settings. Read from the environment by [`EncoderConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub ffmpeg_path: PathBuf,
    /// Parent directory for per-call scratch directories.
    pub work_dir: PathBuf,
    /// Output width in pixels; height follows the image aspect ratio.
    pub width: u32,
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            work_dir: std::env::temp_dir(),
            width: 720,
            fps: 1,
            crf: 23,
            preset: "ultrafast".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl EncoderConfig {
    /// Load encoder configuration from environment variables.
    ///
    /// | Env var            | Default           |
    /// |--------------------|-------------------|
    /// | `FFMPEG_PATH`      | `ffmpeg`          |
    /// | `ENCODER_WORK_DIR` | system temp dir   |
    /// | `VIDEO_WIDTH`      | `720`             |
    /// | `VIDEO_FPS`        | `1`               |
    /// | `VIDEO_CRF`        | `23`              |
    /// | `VIDEO_PRESET`     | `ultrafast`       |
    /// | `AUDIO_BITRATE`    | `128k`            |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            work_dir: std::env::var("ENCODER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            width: env_parse("VIDEO_WIDTH", defaults.width),
            fps: env_parse("VIDEO_FPS", defaults.fps),
            crf: env_parse("VIDEO_CRF", defaults.crf),
            preset: std::env::var("VIDEO_PRESET").unwrap_or(defaults.preset),
            audio_bitrate: std::env::var("AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
        }
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// [`MediaEncoder`] backed by an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, FfmpegError> {
        std::fs::create_dir_all(&self.config.work_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("reverie-encode-")
            .tempdir_in(&self.config.work_dir)?)
    }

    /// Run ffmpeg with `args` and read back `output`.
    async fn run(
        &self,
        args: Vec<OsString>,
        output: &Path,
        timeout: Duration,
    ) -> Result<Vec<u8>, FfmpegError> {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args(args);

        let result = run_command(&mut cmd, timeout).await?;
        if result.exit_code != 0 {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: Some(result.exit_code),
                stderr: tail(&result.stderr, 2000),
            });
        }
        tracing::debug!(duration_ms = result.duration_ms, "ffmpeg finished");

        let bytes = match tokio::fs::read(output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FfmpegError::EmptyOutput)
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Err(FfmpegError::EmptyOutput);
        }
        Ok(bytes)
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn encode_video(
        &self,
        image: &[u8],
        audio: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, FfmpegError> {
        let dir = self.scratch_dir()?;
        let image_path = dir.path().join(format!("still.{}", image_extension(image)));
        let audio_path = dir.path().join(format!("narration.{}", audio_extension(audio)));
        let output_path = dir.path().join("output.mp4");

        tokio::fs::write(&image_path, image).await?;
        tokio::fs::write(&audio_path, audio).await?;

        let args = video_args(&self.config, &image_path, &audio_path, &output_path);
        let result = self.run(args, &output_path, timeout).await;
        drop(dir);
        result
    }

    async fn package_audio(&self, audio: &[u8], timeout: Duration) -> Result<Vec<u8>, FfmpegError> {
        let dir = self.scratch_dir()?;
        let input_path = dir.path().join(format!("narration.{}", audio_extension(audio)));
        let output_path = dir.path().join("output.mp3");

        tokio::fs::write(&input_path, audio).await?;

        let args = audio_args(&self.config, &input_path, &output_path);
        let result = self.run(args, &output_path, timeout).await;
        drop(dir);
        result
    }
}

/// Arguments for the still-image + narration video encode.
///
/// Output is deterministic for identical inputs: encoder tags and container
/// metadata are stripped.
pub fn video_args(
    config: &EncoderConfig,
    image: &Path,
    audio: &Path,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut push = |s: &str| args.push(OsString::from(s));
    push("-y");
    push("-hide_banner");
    push("-loglevel");
    push("error");
    push("-loop");
    push("1");
    push("-i");
    args.push(image.as_os_str().to_owned());
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());
    for s in [
        "-vf".to_string(),
        format!("scale={}:-2", config.width),
        "-r".to_string(),
        config.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        config.preset.clone(),
        "-tune".to_string(),
        "stillimage".to_string(),
        "-crf".to_string(),
        config.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        config.audio_bitrate.clone(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-fflags".to_string(),
        "+bitexact".to_string(),
        "-flags:v".to_string(),
        "+bitexact".to_string(),
        "-flags:a".to_string(),
        "+bitexact".to_string(),
        "-map_metadata".to_string(),
        "-1".to_string(),
    ] {
        args.push(s.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments for re-packaging narration as MP3.
pub fn audio_args(config: &EncoderConfig, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    for s in [
        "-vn",
        "-c:a",
        "libmp3lame",
        "-b:a",
        config.audio_bitrate.as_str(),
        "-ar",
        "44100",
        "-ac",
        "2",
        "-map_metadata",
        "-1",
    ] {
        args.push(s.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// File extension for an encoded still image, sniffed from its header.
fn image_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Gif) => "gif",
        _ => "png",
    }
}

/// File extension for encoded audio, sniffed from its header. Defaults to mp3.
fn audio_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"RIFF") {
        "wav"
    } else if bytes.starts_with(b"OggS") {
        "ogg"
    } else if bytes.starts_with(b"fLaC") {
        "flac"
    } else {
        "mp3"
    }
}

/// Last `max` bytes of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
