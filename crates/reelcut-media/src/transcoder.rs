//! The transcoder capability.
//!
//! Derivation code builds declarative `FfmpegCommand`s and hands them to a
//! `Transcoder`, which runs them to completion or failure. The production
//! implementation shells out to `ffmpeg`/`ffprobe`; tests substitute a fake.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner, RunOutput};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Receiver side of a job's cancellation flag.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that never fires.
pub fn no_cancel() -> CancelSignal {
    watch::channel(false).1
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one invocation, returning its diagnostics on success.
    async fn run(&self, cmd: &FfmpegCommand, cancel: CancelSignal) -> MediaResult<RunOutput>;

    /// Read duration, geometry and stream layout of a media file.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;
}

/// `Transcoder` backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    /// Every invocation is killed after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, cmd: &FfmpegCommand, cancel: CancelSignal) -> MediaResult<RunOutput> {
        let runner = FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .with_cancel(cancel);

        let output = cmd.output().display().to_string();
        let result = runner
            .run_with_progress(cmd, move |progress| {
                if progress.is_complete {
                    debug!(
                        output = %output,
                        frames = progress.frame,
                        speed = progress.speed,
                        "FFmpeg finished encoding"
                    );
                }
            })
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(MediaError::Cancelled) => "cancelled",
            Err(MediaError::Timeout(_)) => "timeout",
            Err(_) => "failure",
        };
        metrics::counter!("reelcut_ffmpeg_invocations_total", "outcome" => outcome).increment(1);
        if let Ok(out) = &result {
            metrics::histogram!("reelcut_ffmpeg_duration_seconds").record(out.elapsed.as_secs_f64());
        }

        result
    }

    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }
}
