//! Render pipeline: request parameters, the compositor seam, and orchestration.

mod compositor;
mod ffmpeg;
mod params;
mod pipeline;

pub use compositor::{Composition, CompositionProps, Compositor, FrameProgress, RenderBundle};
pub use ffmpeg::{build_ffmpeg_args, escape_drawtext, parse_progress_line, FfmpegCompositor};
pub use params::{Caption, TemplateSelection, VideoParams};
pub use pipeline::{
    RenderService, RenderTask, PROGRESS_BUNDLED, PROGRESS_RENDERING, PROGRESS_SELECTED,
};
