//! Renderforged-Common: Shared types and pure resolution logic.
//!
//! This crate provides the I/O-free building blocks used by the render server:
//!
//! - **Typed IDs**: [`RenderId`], the opaque identifier of a render job
//! - **Media references**: [`TemplateRef`] and [`resolve_media_url`], mapping a
//!   loosely specified template to one canonical, fetchable URL
//! - **Timeline**: [`TimelineSpec`] and [`resolve_duration_frames`], computing
//!   the output length in frames from prioritized signals
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use renderforged_common::{resolve_duration_frames, resolve_media_url, MediaSettings};
//! use renderforged_common::{CaptionCue, TemplateRef, TimelineSpec};
//!
//! let media = MediaSettings::default();
//! let url = resolve_media_url(&TemplateRef::parse(Some("template3")), None, &media);
//! assert_eq!(url, "/videos/templates/3.mp4");
//!
//! let spec = TimelineSpec {
//!     captions: vec![CaptionCue { start_ms: 0, end_ms: 4200 }],
//!     ..TimelineSpec::default()
//! };
//! assert_eq!(resolve_duration_frames(&spec, 30), 141);
//! ```

pub mod error;
pub mod ids;
pub mod media_ref;
pub mod timeline;

pub use error::{Error, MediaLoadError, MediaLoadErrorKind, Result};
pub use ids::RenderId;
pub use media_ref::{resolve_media_url, MediaSettings, TemplateRef};
pub use timeline::{resolve_duration_frames, CaptionCue, ImageSlot, SequenceSpec, TimelineSpec};
