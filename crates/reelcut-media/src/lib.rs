//! FFmpeg CLI wrapper and media derivation units.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with progress parsing from `-progress pipe:2`, timeouts and
//!   cancellation via a tokio watch channel
//! - The `Transcoder` capability the derivation engine talks to
//! - Filter graphs for 16:9 and 9:16 clips, loops, stills and shorts
//! - Letterbox detection through `cropdetect`
//! - One render function per output category

pub mod clip;
pub mod command;
pub mod error;
pub mod filters;
pub mod letterbox;
pub mod loops;
pub mod probe;
pub mod progress;
pub mod segments;
pub mod shorts;
pub mod stills;
pub mod transcoder;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clip::{render_clip, ClipOutcome, ClipSpec};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, RunOutput};
pub use error::{MediaError, MediaResult};
pub use letterbox::CropRect;
pub use loops::{plan_loop_starts, render_loop};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use shorts::{plan_short_starts, render_short};
pub use stills::{render_still, still_positions};
pub use transcoder::{no_cancel, CancelSignal, FfmpegTranscoder, Transcoder};
