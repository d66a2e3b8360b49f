//! Boomerang vertical shorts: a 4s vertical segment played forward then reversed.

use std::path::Path;

use rand::Rng;
use tracing::debug;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::{vertical_fill, CONCAT_BOOMERANG, REVERSE};
use crate::segments::{fitting_count, random_slot_starts};
use crate::transcoder::{CancelSignal, Transcoder};

/// Shorts produced per job.
pub const SHORT_COUNT: usize = 5;

/// Forward segment length; the finished short is twice as long.
pub const SHORT_SEGMENT_SECS: f64 = 4.0;

const SHORT_CRF: u8 = 20;

pub fn short_count(duration: f64) -> usize {
    fitting_count(duration, SHORT_SEGMENT_SECS, SHORT_COUNT)
}

/// Random, non-overlapping segment start positions.
pub fn plan_short_starts<R: Rng>(duration: f64, rng: &mut R) -> Vec<f64> {
    random_slot_starts(duration, short_count(duration), SHORT_SEGMENT_SECS, rng)
}

fn encode(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.no_audio()
        .video_codec("libx264")
        .preset("fast")
        .crf(SHORT_CRF)
        .output_args(["-pix_fmt", "yuv420p"])
}

/// Build one short through extract, reverse and concatenate passes.
///
/// Intermediates live in a private directory under `scratch_root` that is
/// removed on every exit path.
pub async fn render_short(
    transcoder: &dyn Transcoder,
    input: &Path,
    start: f64,
    output: &Path,
    scratch_root: &Path,
    cancel: CancelSignal,
) -> MediaResult<()> {
    tokio::fs::create_dir_all(scratch_root).await?;
    let scratch = tempfile::Builder::new().prefix("short-").tempdir_in(scratch_root)?;
    let forward = scratch.path().join("forward.mp4");
    let reversed = scratch.path().join("reversed.mp4");

    let extract = encode(
        FfmpegCommand::new(input, &forward)
            .seek(start)
            .duration(SHORT_SEGMENT_SECS)
            .video_filter(vertical_fill(None)),
    );
    let reverse = encode(FfmpegCommand::new(&forward, &reversed).video_filter(REVERSE));
    let concat = encode(
        FfmpegCommand::new(&forward, output)
            .extra_input(&reversed)
            .filter_complex(CONCAT_BOOMERANG)
            .map("[v]"),
    )
    .output_args(["-movflags", "+faststart"]);

    let result: MediaResult<()> = async {
        transcoder.run(&extract, cancel.clone()).await?;
        transcoder.run(&reverse, cancel.clone()).await?;
        transcoder.run(&concat, cancel).await?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(output).await;
    }
    if let Err(e) = scratch.close() {
        debug!(error = %e, "Failed to remove short scratch directory");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTranscoder;
    use crate::transcoder::no_cancel;

    #[test]
    fn test_short_count() {
        assert_eq!(short_count(3.0), 0);
        assert_eq!(short_count(10.0), 2);
        assert_eq!(short_count(600.0), SHORT_COUNT);
    }

    #[tokio::test]
    async fn test_three_passes_and_scratch_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"src").await.unwrap();
        let output = dir.path().join("out").join("clip_short01.mp4");
        let scratch = dir.path().join("scratch");

        let fake = FakeTranscoder::new(60.0);
        render_short(&fake, &input, 8.0, &output, &scratch, no_cancel()).await.unwrap();

        let calls = fake.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].build_args().windows(2).any(|w| w == ["-vf", "reverse"]));
        assert!(calls[2].build_args().iter().any(|a| a == CONCAT_BOOMERANG));
        assert!(calls.iter().all(|c| c.build_args().contains(&"-an".to_string())));
        assert!(output.exists());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reverse_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"src").await.unwrap();
        let output = dir.path().join("clip_short01.mp4");
        let scratch = dir.path().join("scratch");

        let fake = FakeTranscoder::new(60.0).fail_when_args_contain("reverse");
        assert!(render_short(&fake, &input, 0.0, &output, &scratch, no_cancel()).await.is_err());
        assert_eq!(fake.call_count(), 2);
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }
}
