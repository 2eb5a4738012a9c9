//! Timeline duration resolution.
//!
//! The length of a render is not given directly; it is derived from whichever
//! signal is present, in strict priority order. See [`resolve_duration_frames`].

use serde::{Deserialize, Serialize};

/// Seconds of output assumed per image when images carry no frame data.
const SECONDS_PER_IMAGE: u64 = 5;

/// Output length when no signal is present.
const DEFAULT_SECONDS: u64 = 5;

/// Trailing buffer appended after the last caption.
const CAPTION_TAIL_SECONDS: f64 = 0.5;

/// A video placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSpec {
    #[serde(default)]
    pub media_ref: Option<String>,
    pub start_frame: u64,
    pub duration_in_frames: u64,
}

/// An image slot, optionally pinned to frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSlot {
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub start_frame: Option<u64>,
    #[serde(default)]
    pub duration_in_frames: Option<u64>,
}

/// A caption cue in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionCue {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Every signal the duration can be derived from. Computed fresh per render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineSpec {
    pub explicit_duration_secs: Option<f64>,
    pub audio_duration_secs: Option<f64>,
    pub sequences: Vec<SequenceSpec>,
    pub images: Vec<ImageSlot>,
    pub captions: Vec<CaptionCue>,
}

/// Compute the total output duration in frames.
///
/// First applicable rule wins:
/// 1. explicit duration: `ceil(secs * fps)`
/// 2. measured audio duration: `ceil(secs * fps)`
/// 3. video sequences: latest `start + duration`
/// 4. images: latest `start + duration` over pinned images, otherwise
///    `count * 5s`
/// 5. captions: `ceil((max_end_ms / 1000 + 0.5) * fps)`
/// 6. `5s` worth of frames
///
/// Durations that are not finite and positive count as absent. Frame sums
/// saturate at `u64::MAX`.
pub fn resolve_duration_frames(spec: &TimelineSpec, fps: u32) -> u64 {
    let fps = u64::from(fps);

    if let Some(secs) = positive(spec.explicit_duration_secs) {
        return seconds_to_frames(secs, fps);
    }

    if let Some(secs) = positive(spec.audio_duration_secs) {
        return seconds_to_frames(secs, fps);
    }

    if let Some(end) = spec
        .sequences
        .iter()
        .map(|s| s.start_frame.saturating_add(s.duration_in_frames))
        .max()
    {
        return end;
    }

    if !spec.images.is_empty() {
        let pinned_end = spec
            .images
            .iter()
            .filter_map(|img| Some(img.start_frame?.saturating_add(img.duration_in_frames?)))
            .max();

        return match pinned_end {
            Some(end) => end,
            None => (spec.images.len() as u64).saturating_mul(SECONDS_PER_IMAGE * fps),
        };
    }

    if let Some(last_end_ms) = spec.captions.iter().map(|c| c.end_ms).max() {
        let secs = last_end_ms as f64 / 1000.0 + CAPTION_TAIL_SECONDS;
        return seconds_to_frames(secs, fps);
    }

    DEFAULT_SECONDS * fps
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn seconds_to_frames(secs: f64, fps: u64) -> u64 {
    (secs * fps as f64).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(start_frame: u64, duration_in_frames: u64) -> SequenceSpec {
        SequenceSpec {
            media_ref: None,
            start_frame,
            duration_in_frames,
        }
    }

    fn image(start_frame: Option<u64>, duration_in_frames: Option<u64>) -> ImageSlot {
        ImageSlot {
            src: None,
            start_frame,
            duration_in_frames,
        }
    }

    fn caption(end_ms: u64) -> CaptionCue {
        CaptionCue { start_ms: 0, end_ms }
    }

    #[test]
    fn explicit_duration_is_ceiled() {
        let spec = TimelineSpec {
            explicit_duration_secs: Some(10.01),
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 301);
    }

    #[test]
    fn audio_duration_is_ceiled() {
        let spec = TimelineSpec {
            audio_duration_secs: Some(12.5),
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 375);
    }

    #[test]
    fn sequences_use_latest_end() {
        let spec = TimelineSpec {
            sequences: vec![sequence(0, 90), sequence(60, 120), sequence(30, 10)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 180);
    }

    #[test]
    fn pinned_images_use_latest_end() {
        let spec = TimelineSpec {
            images: vec![
                image(Some(0), Some(150)),
                image(None, Some(40)),
                image(Some(150), Some(90)),
            ],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 240);
    }

    #[test]
    fn oversized_frame_ranges_saturate() {
        let spec = TimelineSpec {
            sequences: vec![sequence(u64::MAX, 1), sequence(0, 30)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), u64::MAX);

        let spec = TimelineSpec {
            images: vec![image(Some(u64::MAX - 5), Some(u64::MAX))],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), u64::MAX);
    }

    #[test]
    fn unpinned_images_use_five_seconds_each() {
        let spec = TimelineSpec {
            images: vec![image(None, None), image(Some(10), None), image(None, None)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 450);
    }

    #[test]
    fn captions_add_trailing_buffer() {
        let spec = TimelineSpec {
            captions: vec![caption(1200), caption(4200), caption(3000)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 141);
    }

    #[test]
    fn empty_spec_defaults_to_five_seconds() {
        assert_eq!(resolve_duration_frames(&TimelineSpec::default(), 30), 150);
        assert_eq!(resolve_duration_frames(&TimelineSpec::default(), 24), 120);
    }

    #[test]
    fn explicit_duration_wins_over_everything() {
        let spec = TimelineSpec {
            explicit_duration_secs: Some(2.0),
            audio_duration_secs: Some(40.0),
            sequences: vec![sequence(0, 900)],
            images: vec![image(Some(0), Some(600))],
            captions: vec![caption(20_000)],
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 60);
    }

    #[test]
    fn audio_wins_over_captions_and_images() {
        let spec = TimelineSpec {
            audio_duration_secs: Some(3.0),
            images: vec![image(None, None)],
            captions: vec![caption(20_000)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 90);
    }

    #[test]
    fn non_positive_durations_are_ignored() {
        let spec = TimelineSpec {
            explicit_duration_secs: Some(0.0),
            audio_duration_secs: Some(f64::NAN),
            captions: vec![caption(1000)],
            ..Default::default()
        };
        assert_eq!(resolve_duration_frames(&spec, 30), 45);
    }

    #[test]
    fn deserializes_camel_case() {
        let spec: TimelineSpec = serde_json::from_str(
            r#"{"explicitDurationSecs": 4, "captions": [{"startMs": 0, "endMs": 500}]}"#,
        )
        .unwrap();
        assert_eq!(spec.explicit_duration_secs, Some(4.0));
        assert_eq!(spec.captions.len(), 1);
    }
}
