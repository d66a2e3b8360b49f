//! Job registry and per-job handles.
//!
//! Each job's snapshot sits behind one mutex, so concurrent unit completions
//! are serialized and no increment is lost. The registry is an explicit value
//! handed to the engine and the API rather than process-global state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use reelcut_models::{JobSnapshot, JobStatus, OutputArtifact, VideoId};

use crate::error::{JobError, JobResult};

/// Shared handle to one job.
#[derive(Debug)]
pub struct JobHandle {
    video_id: VideoId,
    snapshot: Mutex<JobSnapshot>,
    cancel_tx: watch::Sender<bool>,
    archive_path: Mutex<Option<PathBuf>>,
    work_dir: Mutex<Option<PathBuf>>,
}

impl JobHandle {
    fn new(video_id: VideoId, total_units: u32) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            snapshot: Mutex::new(JobSnapshot::new(video_id.clone(), total_units)),
            video_id,
            cancel_tx,
            archive_path: Mutex::new(None),
            work_dir: Mutex::new(None),
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Point-in-time copy for pollers.
    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.snapshot.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.snapshot.lock().is_terminal()
    }

    /// Count a unit that produced `artifact`.
    pub fn record_success(&self, artifact: OutputArtifact) {
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_terminal() {
            return;
        }
        snapshot.push_output(artifact);
        snapshot.record_unit();
    }

    /// Count a unit that failed, keeping its message.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_terminal() {
            return;
        }
        snapshot.push_error(error);
        snapshot.record_unit();
    }

    pub fn complete(&self, archive_path: PathBuf, download_path: impl Into<String>) {
        *self.archive_path.lock() = Some(archive_path);
        self.snapshot.lock().complete(download_path);
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.snapshot.lock().fail(error);
    }

    /// Request cancellation and signal running units.
    ///
    /// Returns `false` if the job had already reached a terminal state.
    pub fn cancel(&self) -> bool {
        let flipped = self.snapshot.lock().cancel();
        if flipped {
            self.cancel_tx.send_replace(true);
        }
        flipped
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Receiver that flips to `true` once the job is cancelled.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        self.archive_path.lock().clone()
    }

    pub fn set_work_dir(&self, dir: PathBuf) {
        *self.work_dir.lock() = Some(dir);
    }

    pub fn work_dir(&self) -> Option<PathBuf> {
        self.work_dir.lock().clone()
    }

    /// Whole seconds since the snapshot last changed.
    pub fn idle_for(&self) -> Duration {
        Duration::from_secs(self.snapshot.lock().idle_secs().max(0) as u64)
    }
}

/// Live jobs keyed by source video.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<VideoId, Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job for `video_id`.
    ///
    /// Rejected while an earlier job for the same video is still processing;
    /// a terminal job is replaced.
    pub fn begin(&self, video_id: VideoId, total_units: u32) -> JobResult<Arc<JobHandle>> {
        let mut jobs = self.jobs.lock();
        if let Some(existing) = jobs.get(&video_id) {
            if !existing.is_terminal() {
                return Err(JobError::AlreadyRunning(video_id));
            }
            debug!(video_id = %video_id, "Replacing finished job");
        }

        let handle = Arc::new(JobHandle::new(video_id.clone(), total_units));
        jobs.insert(video_id.clone(), Arc::clone(&handle));
        drop(jobs);

        info!(video_id = %video_id, total_units, "Job registered");
        counter!("reelcut_jobs_started_total").increment(1);
        Ok(handle)
    }

    pub fn get(&self, video_id: &VideoId) -> Option<Arc<JobHandle>> {
        self.jobs.lock().get(video_id).cloned()
    }

    pub fn snapshot(&self, video_id: &VideoId) -> Option<JobSnapshot> {
        self.get(video_id).map(|h| h.snapshot())
    }

    /// Cancel the job for `video_id`. Idempotent once the job is terminal.
    pub fn cancel(&self, video_id: &VideoId) -> JobResult<JobSnapshot> {
        let handle = self
            .get(video_id)
            .ok_or_else(|| JobError::NotFound(video_id.clone()))?;
        if handle.cancel() {
            info!(video_id = %video_id, "Job cancelled");
            counter!("reelcut_jobs_cancelled_total").increment(1);
        }
        Ok(handle.snapshot())
    }

    /// Remove terminal jobs idle for longer than `retention`, returning them
    /// so the caller can clean up their files.
    pub fn prune_terminal(&self, retention: Duration) -> Vec<Arc<JobHandle>> {
        let mut jobs = self.jobs.lock();
        let expired: Vec<VideoId> = jobs
            .iter()
            .filter(|(_, h)| h.is_terminal() && h.idle_for() >= retention)
            .map(|(id, _)| id.clone())
            .collect();
        expired.iter().filter_map(|id| jobs.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
