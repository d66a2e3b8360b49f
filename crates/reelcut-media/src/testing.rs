//! Scriptable in-process transcoder for tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::command::{FfmpegCommand, RunOutput};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;
use crate::transcoder::{CancelSignal, Transcoder};

type FailRule = Box<dyn Fn(&FfmpegCommand) -> bool + Send + Sync>;

/// Writes a small placeholder file for every successful invocation.
pub struct FakeTranscoder {
    info: VideoInfo,
    failures: Vec<FailRule>,
    diagnostics: Vec<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<FfmpegCommand>>,
    probes: AtomicUsize,
}

impl FakeTranscoder {
    /// A source of `duration` seconds at 1920x1080 with audio.
    pub fn new(duration: f64) -> Self {
        Self {
            info: VideoInfo {
                duration,
                width: 1920,
                height: 1080,
                fps: 30.0,
                codec: "h264".to_string(),
                has_audio: true,
                size: 0,
            },
            failures: Vec::new(),
            diagnostics: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    /// Fail every invocation matching `rule`.
    pub fn fail_when(mut self, rule: impl Fn(&FfmpegCommand) -> bool + Send + Sync + 'static) -> Self {
        self.failures.push(Box::new(rule));
        self
    }

    /// Fail every invocation whose argument list contains `needle`.
    pub fn fail_when_args_contain(self, needle: &'static str) -> Self {
        self.fail_when(move |cmd| cmd.build_args().iter().any(|a| a.contains(needle)))
    }

    /// Stderr lines returned by every successful invocation.
    pub fn with_diagnostics<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diagnostics = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Make every invocation take `delay` (cancellable).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Commands received so far, in call order.
    pub fn calls(&self) -> Vec<FfmpegCommand> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, cmd: &FfmpegCommand, mut cancel: CancelSignal) -> MediaResult<RunOutput> {
        self.calls.lock().push(cmd.clone());

        if *cancel.borrow() {
            return Err(MediaError::Cancelled);
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                fired = async { cancel.wait_for(|c| *c).await.is_ok() } => {
                    if fired {
                        return Err(MediaError::Cancelled);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        if self.failures.iter().any(|rule| rule(cmd)) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with exit status: 1",
                Some("scripted failure".to_string()),
                Some(1),
            ));
        }

        if !cmd.is_null_output() {
            if let Some(parent) = cmd.output().parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(cmd.output(), b"fake media").await?;
        }

        Ok(RunOutput {
            diagnostics: self.diagnostics.clone(),
            ..Default::default()
        })
    }

    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(self.info.clone())
    }
}
