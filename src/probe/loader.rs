//! Metadata loaders.
//!
//! A [`MetadataLoader`] fetches duration and dimensions for one canonical
//! media URL. The shipped implementation shells out to `ffprobe` and maps its
//! failures onto [`MediaLoadErrorKind`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use renderforged_common::media_ref::is_absolute_url;
use renderforged_common::{MediaLoadError, MediaLoadErrorKind};
use serde::{Deserialize, Serialize};

use super::command::ToolCommand;

/// Duration and frame size of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

/// Loads metadata for a canonical media URL.
#[async_trait]
pub trait MetadataLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<MediaMetadata, MediaLoadError>;
}

/// Map a canonical URL to something the media tools can open.
///
/// Absolute `http(s)` URLs pass through; server-rooted paths are resolved
/// against the public directory. Paths escaping it are refused.
pub fn locate_media(url: &str, public_dir: &Path) -> Result<String, MediaLoadError> {
    if is_absolute_url(url) {
        return Ok(url.to_string());
    }

    if url.contains("://") {
        return Err(MediaLoadError::new(
            MediaLoadErrorKind::UnsupportedFormat,
            url,
            "unsupported URL scheme",
        ));
    }

    let relative = Path::new(url.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(MediaLoadError::new(
            MediaLoadErrorKind::UnsupportedFormat,
            url,
            "path escapes the public directory",
        ));
    }

    Ok(public_dir.join(relative).to_string_lossy().to_string())
}

/// [`MetadataLoader`] backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeLoader {
    ffprobe_path: PathBuf,
    public_dir: PathBuf,
}

impl FfprobeLoader {
    pub fn new(ffprobe_path: PathBuf, public_dir: PathBuf) -> Self {
        Self {
            ffprobe_path,
            public_dir,
        }
    }
}

#[async_trait]
impl MetadataLoader for FfprobeLoader {
    async fn load(&self, url: &str) -> Result<MediaMetadata, MediaLoadError> {
        let input = locate_media(url, &self.public_dir)?;

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(input);

        let output = cmd
            .output()
            .await
            .map_err(|e| MediaLoadError::new(MediaLoadErrorKind::Unknown, url, e.to_string()))?;

        if !output.status.success() {
            let stderr = output.stderr.trim();
            let kind = match output.status.code() {
                Some(_) => classify_ffprobe_error(stderr),
                None => MediaLoadErrorKind::Aborted,
            };
            let message = if stderr.is_empty() {
                format!("ffprobe exited with status {}", output.status)
            } else {
                stderr.lines().last().unwrap_or(stderr).to_string()
            };
            return Err(MediaLoadError::new(kind, url, message));
        }

        parse_ffprobe_json(url, &output.stdout)
    }
}

/// Classify ffprobe stderr into a load error kind.
pub fn classify_ffprobe_error(stderr: &str) -> MediaLoadErrorKind {
    let lower = stderr.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["immediate exit requested", "received signal", "operation canceled"]) {
        MediaLoadErrorKind::Aborted
    } else if has(&[
        "connection refused",
        "connection timed out",
        "network is unreachable",
        "failed to resolve",
        "server returned",
        "http error",
        "no such file or directory",
        "input/output error",
    ]) {
        MediaLoadErrorKind::NetworkError
    } else if has(&["protocol not found", "unknown input format", "not supported", "unsupported"]) {
        MediaLoadErrorKind::UnsupportedFormat
    } else if has(&[
        "invalid data found",
        "moov atom not found",
        "error while decoding",
        "could not find codec parameters",
        "invalid argument",
    ]) {
        MediaLoadErrorKind::DecodeError
    } else {
        MediaLoadErrorKind::Unknown
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

fn parse_ffprobe_json(url: &str, json: &str) -> Result<MediaMetadata, MediaLoadError> {
    let ff: FfprobeOutput = serde_json::from_str(json).map_err(|e| {
        MediaLoadError::new(
            MediaLoadErrorKind::DecodeError,
            url,
            format!("ffprobe JSON parse error: {e}"),
        )
    })?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            MediaLoadError::new(MediaLoadErrorKind::DecodeError, url, "no video stream")
        })?;

    let duration_seconds = ff
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            MediaLoadError::new(MediaLoadErrorKind::DecodeError, url, "duration unavailable")
        })?;

    Ok(MediaMetadata {
        duration_seconds,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
    })
}
