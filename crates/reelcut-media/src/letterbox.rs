//! Letterbox detection for vertical reframing.
//!
//! One second around the clip midpoint is run through `cropdetect`; the last
//! rectangle it suggests is the crop applied before scaling to 9:16.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::CROPDETECT;
use crate::transcoder::{CancelSignal, Transcoder};

/// Length of the sampled window in seconds.
pub const PROBE_WINDOW_SECS: f64 = 1.0;

static CROP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"crop=(-?\d+):(-?\d+):(-?\d+):(-?\d+)").expect("crop pattern is valid"));

/// A crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    pub fn to_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Extract the last usable crop suggestion from cropdetect log output.
///
/// Degenerate suggestions (zero or negative size, as reported for fully
/// black frames) are ignored.
pub fn parse_cropdetect<S: AsRef<str>>(lines: &[S]) -> Option<CropRect> {
    lines.iter().rev().find_map(|line| {
        let caps = CROP_PATTERN.captures_iter(line.as_ref()).last()?;
        let values: Vec<i64> = (1..=4)
            .map(|i| caps.get(i).and_then(|m| m.as_str().parse().ok()))
            .collect::<Option<_>>()?;

        match values.as_slice() {
            [w, h, x, y] if *w > 0 && *h > 0 && *x >= 0 && *y >= 0 => Some(CropRect {
                width: *w as u32,
                height: *h as u32,
                x: *x as u32,
                y: *y as u32,
            }),
            _ => None,
        }
    })
}

/// Run the detection pass for a clip spanning `start..end` seconds.
pub async fn detect_letterbox(
    transcoder: &dyn Transcoder,
    input: &Path,
    start: f64,
    end: f64,
    cancel: CancelSignal,
) -> MediaResult<Option<CropRect>> {
    let midpoint = start + (end - start) / 2.0;
    let sample_start = (midpoint - PROBE_WINDOW_SECS / 2.0).max(0.0);

    let cmd = FfmpegCommand::analysis(input)
        .seek(sample_start)
        .duration(PROBE_WINDOW_SECS)
        .video_filter(CROPDETECT)
        .no_audio();

    let output = transcoder.run(&cmd, cancel).await?;
    let rect = parse_cropdetect(&output.diagnostics);
    debug!(?rect, midpoint, "Letterbox detection finished");
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_suggestion() {
        let lines = [
            "[Parsed_cropdetect_0 @ 0x1] x1:0 x2:1919 y1:0 y2:1079 w:1920 h:1088 x:0 y:0 pts:0 t:0.00 crop=1920:1072:0:4",
            "Stream mapping:",
            "[Parsed_cropdetect_0 @ 0x1] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:2 t:0.07 crop=1920:800:0:140",
        ];
        assert_eq!(
            parse_cropdetect(&lines),
            Some(CropRect { width: 1920, height: 800, x: 0, y: 140 })
        );
    }

    #[test]
    fn test_degenerate_suggestion_ignored() {
        let lines = ["[Parsed_cropdetect_0 @ 0x1] crop=-1904:-1072:1912:1080"];
        assert_eq!(parse_cropdetect(&lines), None);
        assert_eq!(parse_cropdetect::<&str>(&[]), None);
    }
}
