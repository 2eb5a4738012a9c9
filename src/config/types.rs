use renderforged_common::MediaSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Static files root; template clips live under it (e.g. `videos/templates/3.mp4`)
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_dir: default_public_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Directory finished artifacts are written to, one `<id>.<container>` per job
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Output container extension
    #[serde(default = "default_container")]
    pub container: String,

    /// Composition selected for every render
    #[serde(default = "default_composition_id")]
    pub composition_id: String,

    /// Used when the template metadata reports no dimensions
    #[serde(default = "default_width")]
    pub default_width: u32,

    #[serde(default = "default_height")]
    pub default_height: u32,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./renders")
}
fn default_fps() -> u32 {
    30
}
fn default_container() -> String {
    "mp4".to_string()
}
fn default_composition_id() -> String {
    "TemplateVideo".to_string()
}
fn default_width() -> u32 {
    1080
}
fn default_height() -> u32 {
    1920
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fps: default_fps(),
            container: default_container(),
            composition_id: default_composition_id(),
            default_width: default_width(),
            default_height: default_height(),
        }
    }
}

impl RenderConfig {
    /// Deterministic artifact path for a job.
    pub fn output_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(self.output_file_name(id))
    }

    pub fn output_file_name(&self, id: &str) -> String {
        format!("{}.{}", id, self.container)
    }

    /// Public download reference for a job's artifact.
    pub fn download_url(&self, id: &str) -> String {
        format!("/renders/{}", self.output_file_name(id))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(flatten)]
    pub reference: MediaSettings,

    /// Bounded wait for a metadata load
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Measured vs expected duration drift that triggers a warning
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: f64,
}

fn default_metadata_timeout() -> u64 {
    8
}
fn default_duration_tolerance() -> f64 {
    0.5
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            reference: MediaSettings::default(),
            metadata_timeout_secs: default_metadata_timeout(),
            duration_tolerance_secs: default_duration_tolerance(),
        }
    }
}

impl MediaConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg path; looked up on PATH when unset
    #[serde(default)]
    pub ffmpeg: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe: Option<PathBuf>,
}
