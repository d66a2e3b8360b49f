//! Clip export for one `(range, aspect ratio)` pair.
//!
//! Clips are cut with input-side seeking for speed. A start on an exact whole
//! second is nudged forward by 0.1s, and if the encode fails outright it is
//! retried once with the window widened by 0.25s on each side.

use std::path::Path;

use tracing::{info, warn};

use reelcut_models::time_range::BOUNDARY_NUDGE_SECS;
use reelcut_models::{AspectRatio, FadeOptions, Quality};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::{audio_fade, chain, landscape_scale, vertical_fill, video_fade};
use crate::letterbox::{detect_letterbox, CropRect};
use crate::transcoder::{CancelSignal, Transcoder};

/// Outward padding applied on the fallback attempt.
pub const FALLBACK_PADDING_SECS: f64 = 0.25;

/// x264 preset for all clip encodes.
pub const CLIP_PRESET: &str = "fast";

/// Audio bitrate when audio has to be re-encoded for a fade.
pub const FADED_AUDIO_BITRATE: &str = "192k";

/// What to cut and how to encode it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    pub start: f64,
    pub end: f64,
    pub ratio: AspectRatio,
    pub quality: Quality,
    pub fade: Option<FadeOptions>,
}

/// Seek position and length actually handed to FFmpeg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub duration: f64,
}

/// Result of a successful clip export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipOutcome {
    /// The padded retry produced the file
    pub used_fallback: bool,
    /// The requested fade was shortened to fit the clip
    pub fade_clamped: bool,
    pub letterbox: Option<CropRect>,
}

/// Start position after the whole-second nudge.
pub fn nudged_start(start: f64) -> f64 {
    if start > 0.0 && start.fract() == 0.0 {
        start + BOUNDARY_NUDGE_SECS
    } else {
        start
    }
}

impl ClipSpec {
    pub fn primary_window(&self) -> ClipWindow {
        let start = nudged_start(self.start);
        ClipWindow {
            start,
            duration: (self.end - start).max(BOUNDARY_NUDGE_SECS),
        }
    }

    /// Window widened on both sides, kept inside the source when its length is known.
    pub fn fallback_window(&self, source_duration: Option<f64>) -> ClipWindow {
        let start = (self.start - FALLBACK_PADDING_SECS).max(0.0);
        let mut end = self.end + FALLBACK_PADDING_SECS;
        if let Some(limit) = source_duration {
            end = end.min(limit);
        }
        ClipWindow {
            start,
            duration: (end - start).max(BOUNDARY_NUDGE_SECS),
        }
    }
}

/// Build the encode command for `spec` over `window`.
///
/// Returns the command and whether the fade had to be clamped.
pub fn build_clip_command(
    input: &Path,
    output: &Path,
    spec: &ClipSpec,
    window: ClipWindow,
    letterbox: Option<CropRect>,
) -> (FfmpegCommand, bool) {
    let fade = spec.fade.filter(FadeOptions::is_active);
    let (fade_secs, clamped) = match fade {
        Some(f) => f.clamped_for(window.duration),
        None => (0.0, false),
    };

    let geometry = match spec.ratio {
        AspectRatio::Landscape => landscape_scale(),
        AspectRatio::Vertical => vertical_fill(letterbox),
    };
    let fade_filter = match fade {
        Some(f) if f.video && fade_secs > 0.0 => video_fade(window.duration, fade_secs),
        _ => String::new(),
    };

    let mut cmd = FfmpegCommand::new(input, output)
        .seek(window.start)
        .duration(window.duration)
        .map("0:v:0")
        .map("0:a?")
        .video_filter(chain([geometry, fade_filter]))
        .video_codec("libx264")
        .preset(CLIP_PRESET)
        .crf(spec.quality.crf())
        .output_args(["-pix_fmt", "yuv420p"]);

    cmd = match fade {
        Some(f) if f.audio && fade_secs > 0.0 => cmd
            .audio_filter(audio_fade(window.duration, fade_secs))
            .audio_codec("aac")
            .audio_bitrate(FADED_AUDIO_BITRATE),
        _ => cmd.audio_codec("copy"),
    };

    (cmd.output_args(["-movflags", "+faststart"]), clamped)
}

/// Export one clip, with letterbox detection for vertical output and one
/// padded retry on failure.
pub async fn render_clip(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    spec: &ClipSpec,
    source_duration: Option<f64>,
    cancel: CancelSignal,
) -> MediaResult<ClipOutcome> {
    let letterbox = match spec.ratio {
        AspectRatio::Vertical => {
            match detect_letterbox(transcoder, input, spec.start, spec.end, cancel.clone()).await {
                Ok(rect) => rect,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Letterbox detection failed, reframing without crop");
                    None
                }
            }
        }
        AspectRatio::Landscape => None,
    };

    let (cmd, fade_clamped) = build_clip_command(input, output, spec, spec.primary_window(), letterbox);
    match transcoder.run(&cmd, cancel.clone()).await {
        Ok(_) => {
            return Ok(ClipOutcome {
                used_fallback: false,
                fade_clamped,
                letterbox,
            })
        }
        Err(e) if e.is_cancelled() => {
            remove_partial(output).await;
            return Err(e);
        }
        Err(e) => {
            warn!(
                output = %output.display(),
                error = %e.summary(),
                "Clip encode failed, retrying with padded window"
            );
            remove_partial(output).await;
        }
    }

    let window = spec.fallback_window(source_duration);
    let (cmd, fade_clamped) = build_clip_command(input, output, spec, window, letterbox);
    match transcoder.run(&cmd, cancel).await {
        Ok(_) => {
            info!(output = %output.display(), "Clip produced by fallback encode");
            Ok(ClipOutcome {
                used_fallback: true,
                fade_clamped,
                letterbox,
            })
        }
        Err(e) => {
            remove_partial(output).await;
            Err(e)
        }
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}
