//! Still thumbnail export.

use std::path::Path;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::still_scale;
use crate::transcoder::{CancelSignal, Transcoder};

/// Stills captured per job.
pub const STILL_COUNT: usize = 10;

/// Evenly spaced capture points that skip the very start and end.
pub fn still_positions(duration: f64, count: usize) -> Vec<f64> {
    if duration <= 0.0 {
        return Vec::new();
    }
    (1..=count)
        .map(|i| duration * i as f64 / (count + 1) as f64)
        .collect()
}

/// Capture a single JPEG frame at `at` seconds.
pub async fn render_still(
    transcoder: &dyn Transcoder,
    input: &Path,
    at: f64,
    output: &Path,
    cancel: CancelSignal,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .seek(at)
        .single_frame()
        .video_filter(still_scale())
        .output_args(["-q:v", "2"]);

    transcoder.run(&cmd, cancel).await.map(|_| ())
}
