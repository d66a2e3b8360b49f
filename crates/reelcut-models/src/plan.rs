//! Work plans: what to derive from one source video in one request.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::time_range::TimeRange;
use crate::video::VideoId;

/// Fade length used when a fade is requested without a duration.
pub const DEFAULT_FADE_SECS: f64 = 0.5;

/// Output aspect ratio for clip exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum AspectRatio {
    /// 16:9 landscape
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 vertical
    #[serde(rename = "9:16")]
    Vertical,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Vertical => "9:16",
        }
    }

    /// Filesystem-safe tag (`16x9`, `9x16`).
    pub fn tag(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16x9",
            AspectRatio::Vertical => "9x16",
        }
    }

    /// Parse `16:9` / `9:16` (also accepts the `x` tag form).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "16:9" | "16x9" => Some(AspectRatio::Landscape),
            "9:16" | "9x16" => Some(AspectRatio::Vertical),
            _ => None,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression tier for re-encoded clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    #[default]
    Balanced,
    Compressed,
}

impl Quality {
    /// libx264 constant rate factor for this tier.
    pub fn crf(&self) -> u8 {
        match self {
            Quality::High => 18,
            Quality::Balanced => 23,
            Quality::Compressed => 28,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Balanced => "balanced",
            Quality::Compressed => "compressed",
        }
    }
}

/// Symmetric fade applied at both clip boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FadeOptions {
    pub video: bool,
    pub audio: bool,
    pub duration_secs: f64,
}

impl FadeOptions {
    pub fn is_active(&self) -> bool {
        (self.video || self.audio) && self.duration_secs > 0.0
    }

    /// Fade length usable on a clip of `clip_secs`, kept strictly below half the clip.
    ///
    /// Returns the effective length and whether it had to be shortened.
    pub fn clamped_for(&self, clip_secs: f64) -> (f64, bool) {
        let limit = (clip_secs / 2.0 - 0.01).max(0.0);
        if self.duration_secs < clip_secs / 2.0 {
            (self.duration_secs, false)
        } else {
            (limit, true)
        }
    }
}

/// Processing submission as received from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub video_id: VideoId,
    /// Free-text cut list, one range per line
    #[serde(default)]
    pub time_range_text: Option<String>,
    #[serde(default)]
    pub output_name: String,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub video_fade: bool,
    #[serde(default)]
    pub audio_fade: bool,
    #[serde(default)]
    pub fade_duration: Option<f64>,
    #[serde(default)]
    pub aspect_ratios: Vec<AspectRatio>,
    #[serde(default)]
    pub generate_loop: bool,
    #[serde(default)]
    pub generate_stills: bool,
    #[serde(default)]
    pub generate_shorts: bool,
}

impl ProcessRequest {
    /// Fade settings, if any fade was requested.
    pub fn fade(&self) -> Option<FadeOptions> {
        let fade = FadeOptions {
            video: self.video_fade,
            audio: self.audio_fade,
            duration_secs: self.fade_duration.unwrap_or(DEFAULT_FADE_SECS),
        };
        fade.is_active().then_some(fade)
    }

    pub fn has_exports(&self) -> bool {
        self.generate_loop || self.generate_stills || self.generate_shorts
    }
}

/// Immutable description of the work for one job: cuts × ratios plus exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkPlan {
    pub video_id: VideoId,
    pub output_name: String,
    pub ranges: Vec<TimeRange>,
    pub aspect_ratios: Vec<AspectRatio>,
    pub quality: Quality,
    pub fade: Option<FadeOptions>,
    pub export_loops: bool,
    pub export_stills: bool,
    pub export_shorts: bool,
}

impl WorkPlan {
    /// Number of clip units (every range in every ratio).
    pub fn clip_units(&self) -> usize {
        self.ranges.len() * self.aspect_ratios.len()
    }

    pub fn has_exports(&self) -> bool {
        self.export_loops || self.export_stills || self.export_shorts
    }

    /// True when the plan would produce nothing at all.
    pub fn is_empty(&self) -> bool {
        self.clip_units() == 0 && !self.has_exports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_serde() {
        let json = serde_json::to_string(&vec![AspectRatio::Landscape, AspectRatio::Vertical]).unwrap();
        assert_eq!(json, r#"["16:9","9:16"]"#);
        assert_eq!(AspectRatio::parse("9x16"), Some(AspectRatio::Vertical));
        assert_eq!(AspectRatio::parse("4:3"), None);
    }

    #[test]
    fn test_quality_crf() {
        assert_eq!(Quality::High.crf(), 18);
        assert_eq!(Quality::default().crf(), 23);
        assert_eq!(Quality::Compressed.crf(), 28);
    }

    #[test]
    fn test_fade_clamp() {
        let fade = FadeOptions { video: true, audio: false, duration_secs: 3.0 };
        assert_eq!(fade.clamped_for(10.0), (3.0, false));
        let (secs, clamped) = fade.clamped_for(4.0);
        assert!(clamped);
        assert!(secs < 2.0 && secs > 1.9);
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: ProcessRequest = serde_json::from_str(
            r#"{"videoId":"abc","timeRangeText":"0:10-0:20","outputName":"x",
                "quality":"high","videoFade":true,"aspectRatios":["9:16"],"generateStills":true}"#,
        )
        .unwrap();
        assert_eq!(req.video_id.as_str(), "abc");
        assert_eq!(req.quality, Quality::High);
        assert_eq!(req.aspect_ratios, vec![AspectRatio::Vertical]);
        assert!(req.has_exports());
        let fade = req.fade().unwrap();
        assert!(fade.video && !fade.audio);
        assert_eq!(fade.duration_secs, DEFAULT_FADE_SECS);
    }

    #[test]
    fn test_no_fade_when_not_requested() {
        let req = ProcessRequest { fade_duration: Some(2.0), ..Default::default() };
        assert!(req.fade().is_none());
    }
}
