//! Compositor adapter seam.
//!
//! The compositor is the engine that turns a composition descriptor into
//! encoded frames. The pipeline drives it in three stages (bundle, select,
//! render) and drains per-frame progress from a channel.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use renderforged_common::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::params::Caption;

/// Output of the bundle stage; handed back to the later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBundle {
    /// Engine executable or entry point.
    pub entry: PathBuf,
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,
}

/// Inputs a composition is selected with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionProps {
    /// Canonical URL of the background clip
    pub video_url: String,
    /// Location the engine should read the clip from
    pub video_input: String,
    pub text: Option<String>,
    /// Location of the background music, if any
    pub audio_input: Option<String>,
    pub captions: Vec<Caption>,
    pub duration_in_frames: u64,
    /// Clip dimensions from metadata; zero when unknown
    pub width: u32,
    pub height: u32,
}

/// A selected composition with its timing fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_in_frames: u64,
    pub props: CompositionProps,
}

/// Frames rendered so far out of the composition total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub rendered: u64,
    pub total: u64,
}

impl FrameProgress {
    /// Render progress in percent, held below 100 until the call returns.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.rendered as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 99.0) as u8
    }
}

#[async_trait]
pub trait Compositor: Send + Sync {
    /// Prepare the engine.
    async fn bundle(&self) -> Result<RenderBundle>;

    /// Select the composition to render and fix its dimensions and duration.
    async fn select_composition(
        &self,
        bundle: &RenderBundle,
        id: &str,
        props: &CompositionProps,
    ) -> Result<Composition>;

    /// Render `composition` to `output`, sending progress as frames complete.
    ///
    /// Dropped progress receivers are ignored.
    async fn render(
        &self,
        bundle: &RenderBundle,
        composition: &Composition,
        output: &Path,
        progress: mpsc::Sender<FrameProgress>,
    ) -> Result<()>;
}
