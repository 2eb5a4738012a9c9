//! [`Compositor`] backed by the `ffmpeg` CLI.
//!
//! The template clip is looped and scaled to the composition size, overlay
//! text and captions are drawn with `drawtext`, and optional background music
//! is mapped in. Progress comes from `-progress pipe:1` on stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use renderforged_common::{Error, Result};
use tokio::sync::mpsc;

use super::compositor::{Composition, CompositionProps, Compositor, FrameProgress, RenderBundle};
use crate::config::Config;
use crate::probe::{find_tool, ToolCommand};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    ffmpeg: Option<PathBuf>,
    output_dir: PathBuf,
    composition_id: String,
    fps: u32,
    default_width: u32,
    default_height: u32,
}

impl FfmpegCompositor {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            output_dir: config.render.output_dir.clone(),
            composition_id: config.render.composition_id.clone(),
            fps: config.render.fps,
            default_width: config.render.default_width,
            default_height: config.render.default_height,
        }
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn bundle(&self) -> Result<RenderBundle> {
        let entry = find_tool("ffmpeg", self.ffmpeg.as_deref()).ok_or_else(|| {
            Error::tool("ffmpeg", "not found (set tools.ffmpeg or add it to PATH)")
        })?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        Ok(RenderBundle {
            entry,
            output_dir: self.output_dir.clone(),
        })
    }

    async fn select_composition(
        &self,
        _bundle: &RenderBundle,
        id: &str,
        props: &CompositionProps,
    ) -> Result<Composition> {
        if id != self.composition_id {
            return Err(Error::pipeline(
                "select",
                format!("unknown composition '{id}'"),
            ));
        }

        let width = if props.width > 0 { props.width } else { self.default_width };
        let height = if props.height > 0 { props.height } else { self.default_height };

        Ok(Composition {
            id: id.to_string(),
            // libx264 with yuv420p needs even dimensions
            width: (width & !1).max(2),
            height: (height & !1).max(2),
            fps: self.fps,
            duration_in_frames: props.duration_in_frames.max(1),
            props: props.clone(),
        })
    }

    async fn render(
        &self,
        bundle: &RenderBundle,
        composition: &Composition,
        output: &Path,
        progress: mpsc::Sender<FrameProgress>,
    ) -> Result<()> {
        let total = composition.duration_in_frames;

        tracing::info!(
            "ffmpeg render: {} -> {:?} ({}x{}, {} frames @ {} fps)",
            composition.props.video_url,
            output,
            composition.width,
            composition.height,
            total,
            composition.fps
        );

        let mut cmd = ToolCommand::new(bundle.entry.clone());
        cmd.no_timeout();
        cmd.args(build_ffmpeg_args(composition, output));

        let result = cmd
            .output_streaming(|line| {
                if let Some(frame) = parse_progress_line(line) {
                    let _ = progress.try_send(FrameProgress {
                        rendered: frame.min(total),
                        total,
                    });
                }
            })
            .await?;

        if !result.status.success() {
            return Err(Error::tool(
                "ffmpeg",
                format!(
                    "exited with status {}: {}",
                    result.status,
                    stderr_tail(&result.stderr)
                ),
            ));
        }

        Ok(())
    }
}

/// Build the full ffmpeg argument list for a composition.
pub fn build_ffmpeg_args(composition: &Composition, output: &Path) -> Vec<String> {
    let props = &composition.props;
    let mut args: Vec<String> = [
        "-y", "-hide_banner", "-nostats", "-loglevel", "error", "-progress", "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend(["-stream_loop", "-1", "-i"].map(String::from));
    args.push(props.video_input.clone());

    if let Some(audio) = &props.audio_input {
        args.push("-i".into());
        args.push(audio.clone());
    }

    args.push("-filter_complex".into());
    args.push(build_filter_graph(composition));
    args.extend(["-map", "[v]"].map(String::from));

    if props.audio_input.is_some() {
        args.extend(["-map", "1:a:0", "-c:a", "aac", "-b:a", "192k"].map(String::from));
    } else {
        args.push("-an".into());
    }

    let seconds = composition.duration_in_frames as f64 / composition.fps.max(1) as f64;
    args.extend([
        "-frames:v".to_string(),
        composition.duration_in_frames.to_string(),
        "-t".to_string(),
        format!("{seconds:.3}"),
        "-r".to_string(),
        composition.fps.to_string(),
    ]);
    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]
        .map(String::from),
    );
    args.push(output.to_string_lossy().to_string());

    args
}

fn build_filter_graph(composition: &Composition) -> String {
    let (w, h) = (composition.width, composition.height);
    let mut graph = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={}",
        composition.fps
    );

    if let Some(text) = composition.props.text.as_deref().filter(|t| !t.trim().is_empty()) {
        graph.push_str(&format!(
            ",drawtext=expansion=none:text={}:fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2:box=1:boxcolor=black@0.4:boxborderw=20",
            escape_drawtext(text),
            (h / 18).max(12)
        ));
    }

    for caption in &composition.props.captions {
        if caption.text.trim().is_empty() || caption.end_ms <= caption.start_ms {
            continue;
        }
        graph.push_str(&format!(
            ",drawtext=expansion=none:text={}:fontcolor=white:fontsize={}:x=(w-text_w)/2:y=h*0.8:enable='between(t,{:.3},{:.3})'",
            escape_drawtext(&caption.text),
            (h / 24).max(10),
            caption.start_ms as f64 / 1000.0,
            caption.end_ms as f64 / 1000.0
        ));
    }

    graph.push_str("[v]");
    graph
}

/// Escape text for an unquoted `drawtext` value inside `-filter_complex`.
///
/// Option values are unescaped once by the option parser and once by the
/// graph parser, so each level is applied in turn.
pub fn escape_drawtext(text: &str) -> String {
    let option_level = escape_chars(text, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Frame count from one `-progress` line (`frame=123`).
pub fn parse_progress_line(line: &str) -> Option<u64> {
    line.trim().strip_prefix("frame=")?.trim().parse().ok()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("; ")
}
