//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory; each job writes its outputs below `<work_dir>/<video_id>`
    pub work_dir: PathBuf,
    /// Hard limit for a single FFmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    /// Wall clock allowed for the whole shorts batch
    pub shorts_timeout: Duration,
    /// Maximum concurrent FFmpeg processes within a category
    pub max_ffmpeg_processes: usize,
    /// How long finished jobs stay pollable
    pub job_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelcut/work"),
            ffmpeg_timeout_secs: 120,
            shorts_timeout: Duration::from_secs(300),
            max_ffmpeg_processes: 4,
            job_retention: Duration::from_secs(86400),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/reelcut/work")),
            ffmpeg_timeout_secs: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            shorts_timeout: Duration::from_secs(
                std::env::var("SHORTS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_ffmpeg_processes: std::env::var("WORKER_MAX_FFMPEG")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(4),
            job_retention: Duration::from_secs(
                std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86400),
            ),
        }
    }

    /// Directory holding the outputs of one job.
    pub fn job_dir(&self, video_id: &str) -> PathBuf {
        self.work_dir.join(video_id)
    }
}
