//! Background retention sweeps.
//!
//! This service runs periodically to:
//! - Reclaim upload sessions that stopped receiving chunks
//! - Delete uploaded sources past their retention window, with their records
//! - Drop finished jobs past their polling window, with their work and
//!   archive directories

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use reelcut_models::SourceVideo;
use reelcut_storage::{RecordStore, UploadAssembler};
use reelcut_worker::DerivationEngine;

use crate::metrics::record_janitor_reclaimed;
use crate::state::AppState;

/// What one sweep removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub orphaned_dirs: usize,
    pub uploads: usize,
    pub records: usize,
    pub jobs: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Retention janitor.
pub struct Janitor {
    uploads: Arc<UploadAssembler>,
    videos: Arc<dyn RecordStore<SourceVideo>>,
    engine: Arc<DerivationEngine>,
    interval: Duration,
    session_ttl: Duration,
    upload_retention: Duration,
    job_retention: Duration,
    enabled: bool,
}

impl Janitor {
    /// Create a janitor over the app's stores, using their configured windows.
    pub fn new(state: &AppState) -> Self {
        let storage = state.uploads.config();
        let enabled = std::env::var("ENABLE_JANITOR")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            uploads: Arc::clone(&state.uploads),
            videos: Arc::clone(&state.videos),
            engine: Arc::clone(&state.engine),
            interval: storage.janitor_interval,
            session_ttl: storage.session_ttl,
            upload_retention: storage.upload_retention,
            job_retention: state.engine.config().job_retention,
            enabled,
        }
    }

    /// Override every retention window, mainly for tests.
    pub fn with_windows(mut self, session_ttl: Duration, upload_retention: Duration, job_retention: Duration) -> Self {
        self.session_ttl = session_ttl;
        self.upload_retention = upload_retention;
        self.job_retention = job_retention;
        self
    }

    /// Start the background sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Retention janitor is disabled");
            return;
        }

        info!("Starting retention janitor (interval: {:?})", self.interval);

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            let report = self.sweep().await;
            if !report.is_empty() {
                info!(
                    sessions = report.sessions,
                    orphaned_dirs = report.orphaned_dirs,
                    uploads = report.uploads,
                    records = report.records,
                    jobs = report.jobs,
                    "Retention sweep finished"
                );
            }
        }
    }

    /// Run a single sweep. Failures in one step don't stop the others.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.uploads.reclaim_stale(self.session_ttl).await {
            Ok(reclaimed) => {
                report.sessions = reclaimed.sessions;
                report.orphaned_dirs = reclaimed.orphaned_dirs;
            }
            Err(e) => error!("Upload session reclaim failed: {}", e),
        }

        match self.uploads.purge_old_uploads(self.upload_retention).await {
            Ok(removed) => {
                report.uploads = removed.len();
                report.records = self.forget_videos(removed).await;
            }
            Err(e) => error!("Upload purge failed: {}", e),
        }

        let pruned = self.engine.jobs().prune_terminal(self.job_retention);
        report.jobs = pruned.len();
        for handle in pruned {
            self.engine.cleanup_job(&handle).await;
        }

        record_janitor_reclaimed("sessions", report.sessions + report.orphaned_dirs);
        record_janitor_reclaimed("uploads", report.uploads);
        record_janitor_reclaimed("jobs", report.jobs);
        report
    }

    /// Delete catalog records whose source file was purged.
    async fn forget_videos(&self, removed: Vec<PathBuf>) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let removed: HashSet<PathBuf> = removed.into_iter().collect();

        let videos = match self.videos.list().await {
            Ok(videos) => videos,
            Err(e) => {
                error!("Listing videos failed: {}", e);
                return 0;
            }
        };

        let mut forgotten = 0;
        for video in videos.iter().filter(|v| removed.contains(&v.path)) {
            match self.videos.delete(video.id.as_str()).await {
                Ok(true) => forgotten += 1,
                Ok(false) => {}
                Err(e) => warn!(video_id = %video.id, "Failed to delete video record: {}", e),
            }
        }
        forgotten
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use reelcut_media::testing::FakeTranscoder;
    use reelcut_models::ProcessRequest;

    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn test_sweep_reclaims_everything_past_its_window() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeTranscoder::new(30.0)).await;

        let uploads_dir = state.uploads.config().uploads_dir();
        let path = uploads_dir.join("old.mp4");
        tokio::fs::write(&path, b"source").await.unwrap();
        let video = SourceVideo::new("old".into(), "old.mp4", "old.mp4", path.clone(), 6);
        state.videos.create("old", video.clone()).await.unwrap();

        let request = ProcessRequest {
            video_id: video.id.clone(),
            generate_stills: true,
            ..ProcessRequest::default()
        };
        let outcome = state.engine.process(&video, &request).await.unwrap();
        assert!(outcome.archive.path.exists());

        let body = stream::iter(vec![Ok::<_, std::io::Error>(axum::body::Bytes::from_static(b"part"))]);
        state.uploads.write_chunk("stale", 0, 2, "a.mp4", body).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let janitor = Janitor::new(&state).with_windows(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        let report = janitor.sweep().await;

        assert_eq!(report.sessions, 1);
        assert_eq!(report.uploads, 1);
        assert_eq!(report.records, 1);
        assert_eq!(report.jobs, 1);
        assert!(!path.exists());
        assert!(!outcome.archive.path.exists());
        assert!(state.videos.get("old").await.unwrap().is_none());
        assert!(state.jobs.get(&video.id).is_none());
        assert_eq!(state.uploads.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_items() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeTranscoder::new(30.0)).await;
        let path = state.uploads.config().uploads_dir().join("fresh.mp4");
        tokio::fs::write(&path, b"source").await.unwrap();

        let report = Janitor::new(&state).sweep().await;
        assert!(report.is_empty());
        assert!(path.exists());
    }
}
