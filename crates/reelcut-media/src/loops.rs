//! Animated loop (GIF) export.

use std::path::Path;

use rand::Rng;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::{loop_palettegen, loop_paletteuse};
use crate::segments::{fitting_count, random_slot_starts};
use crate::transcoder::{CancelSignal, Transcoder};

/// Upper bound on loops per job.
pub const MAX_LOOPS: usize = 10;

/// Length of each loop in seconds.
pub const LOOP_SEGMENT_SECS: f64 = 6.0;

/// Number of loops a source of `duration` seconds yields.
pub fn loop_count(duration: f64) -> usize {
    fitting_count(duration, LOOP_SEGMENT_SECS, MAX_LOOPS)
}

/// Random, non-overlapping loop start positions.
pub fn plan_loop_starts<R: Rng>(duration: f64, rng: &mut R) -> Vec<f64> {
    random_slot_starts(duration, loop_count(duration), LOOP_SEGMENT_SECS, rng)
}

/// Render one loop in two passes: palette generation, then palette mapping.
///
/// The intermediate palette sits next to `output` and is removed whatever
/// the outcome.
pub async fn render_loop(
    transcoder: &dyn Transcoder,
    input: &Path,
    start: f64,
    output: &Path,
    cancel: CancelSignal,
) -> MediaResult<()> {
    let palette = output.with_extension("palette.png");

    let palette_pass = FfmpegCommand::new(input, &palette)
        .seek(start)
        .duration(LOOP_SEGMENT_SECS)
        .video_filter(loop_palettegen())
        .single_frame();

    let encode_pass = FfmpegCommand::new(input, output)
        .seek(start)
        .duration(LOOP_SEGMENT_SECS)
        .extra_input(&palette)
        .filter_complex(loop_paletteuse())
        .output_args(["-loop", "0"]);

    let result: MediaResult<()> = async {
        transcoder.run(&palette_pass, cancel.clone()).await?;
        transcoder.run(&encode_pass, cancel).await?;
        Ok(())
    }
    .await;

    let _ = tokio::fs::remove_file(&palette).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(output).await;
    }
    result
}
