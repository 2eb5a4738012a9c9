//! Typed view over submitted render parameters.
//!
//! The raw `videoParams` and `template` values are stored on the job exactly
//! as submitted; the pipeline works from the typed view parsed here.

use renderforged_common::{
    CaptionCue, Error, ImageSlot, Result, SequenceSpec, TemplateRef, TimelineSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Render parameters. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoParams {
    /// Explicit background clip URL
    pub video_url: Option<String>,
    /// Requested output length
    pub duration_in_seconds: Option<f64>,
    /// Expected length of the template clip, checked against its metadata
    pub template_duration: Option<f64>,
    /// Overlay text
    pub text: Option<String>,
    /// Background music
    pub audio_url: Option<String>,
    /// Measured music length
    pub audio_duration: Option<f64>,
    pub sequences: Vec<SequenceSpec>,
    pub images: Vec<ImageSlot>,
    pub captions: Vec<Caption>,
}

/// A caption cue with its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    #[serde(default)]
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl VideoParams {
    /// Parse the submitted `videoParams` value.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::Validation("videoParams must be an object".into()));
        }
        Self::deserialize(value).map_err(|e| Error::Validation(format!("invalid videoParams: {e}")))
    }

    /// Timeline signals carried by these parameters.
    pub fn timeline(&self) -> TimelineSpec {
        TimelineSpec {
            explicit_duration_secs: self.duration_in_seconds,
            audio_duration_secs: self.audio_duration,
            sequences: self.sequences.clone(),
            images: self.images.clone(),
            captions: self
                .captions
                .iter()
                .map(|c| CaptionCue {
                    start_ms: c.start_ms,
                    end_ms: c.end_ms,
                })
                .collect(),
        }
    }
}

/// A template reference plus the explicit URL that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSelection {
    pub template: TemplateRef,
    pub explicit_url: Option<String>,
}

impl TemplateSelection {
    /// Read the submitted `template` value.
    ///
    /// Accepts a string, a number, or an object with optional `id` and `url`.
    /// `videoUrl` from the parameters takes precedence over `template.url`.
    pub fn from_request(template: &Value, params: &VideoParams) -> Result<Self> {
        let (raw, template_url) = match template {
            Value::Null => (None, None),
            Value::String(s) => (Some(s.clone()), None),
            Value::Number(n) => (Some(n.to_string()), None),
            Value::Object(map) => {
                let id = match map.get("id") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(_) => return Err(Error::Validation("template.id must be a string".into())),
                };
                let url = match map.get("url") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(_) => {
                        return Err(Error::Validation("template.url must be a string".into()))
                    }
                };
                (id, url)
            }
            _ => {
                return Err(Error::Validation(
                    "template must be a string or an object".into(),
                ))
            }
        };

        Ok(Self {
            template: TemplateRef::parse(raw.as_deref()),
            explicit_url: params.video_url.clone().or(template_url),
        })
    }
}
