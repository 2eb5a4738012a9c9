//! Media metadata: tool invocation, loading, and the shared cache.

mod cache;
mod command;
mod loader;

pub use cache::{MetadataCache, DEFAULT_DURATION_TOLERANCE_SECS, DEFAULT_METADATA_TIMEOUT};
pub use command::{ToolCommand, ToolOutput};
pub use loader::{
    classify_ffprobe_error, locate_media, FfprobeLoader, MediaMetadata, MetadataLoader,
};

use std::path::{Path, PathBuf};

/// Availability of an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolve a tool from an explicit path or `PATH`.
pub fn find_tool(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) => which::which(path).ok(),
        None => which::which(name).ok(),
    }
}

/// Check a single tool, reading its `-version` banner.
pub async fn check_tool(name: &str, configured: Option<&Path>) -> ToolInfo {
    let Some(path) = find_tool(name, configured) else {
        return ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        };
    };

    let version = ToolCommand::new(path.clone())
        .arg("-version")
        .execute()
        .await
        .ok()
        .and_then(|out| out.stdout.lines().next().map(str::to_string));

    ToolInfo {
        name: name.to_string(),
        available: true,
        version,
        path: Some(path),
    }
}

/// Check the tools rendering depends on.
pub async fn check_tools(tools: &crate::config::ToolsConfig) -> Vec<ToolInfo> {
    vec![
        check_tool("ffmpeg", tools.ffmpeg.as_deref()).await,
        check_tool("ffprobe", tools.ffprobe.as_deref()).await,
    ]
}
