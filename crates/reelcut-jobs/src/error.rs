//! Job registry error types.

use thiserror::Error;

use reelcut_models::VideoId;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A job is already processing video {0}")]
    AlreadyRunning(VideoId),

    #[error("No job found for video {0}")]
    NotFound(VideoId),
}
