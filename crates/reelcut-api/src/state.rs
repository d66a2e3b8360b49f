//! Application state.

use std::sync::Arc;

use reelcut_jobs::JobRegistry;
use reelcut_media::{FfmpegTranscoder, Transcoder};
use reelcut_models::SourceVideo;
use reelcut_storage::{MemoryRecordStore, RecordStore, StorageConfig, UploadAssembler};
use reelcut_worker::{DerivationEngine, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub uploads: Arc<UploadAssembler>,
    pub videos: Arc<dyn RecordStore<SourceVideo>>,
    pub jobs: Arc<JobRegistry>,
    pub engine: Arc<DerivationEngine>,
}

impl AppState {
    /// Create application state from the environment, backed by the FFmpeg CLI.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = StorageConfig::from_env();
        let worker = WorkerConfig::from_env();
        let transcoder = Arc::new(FfmpegTranscoder::new(worker.ffmpeg_timeout_secs));
        Self::with_transcoder(config, storage, worker, transcoder).await
    }

    /// Create application state around an explicit transcoder.
    pub async fn with_transcoder(
        config: ApiConfig,
        storage: StorageConfig,
        worker: WorkerConfig,
        transcoder: Arc<dyn Transcoder>,
    ) -> anyhow::Result<Self> {
        storage.ensure_dirs().await?;
        tokio::fs::create_dir_all(&worker.work_dir).await?;

        let jobs = Arc::new(JobRegistry::new());
        let engine = DerivationEngine::new(transcoder, Arc::clone(&jobs), worker, storage.archives_dir());

        Ok(Self {
            config,
            uploads: Arc::new(UploadAssembler::new(storage)),
            videos: Arc::new(MemoryRecordStore::<SourceVideo>::new()),
            jobs,
            engine: Arc::new(engine),
        })
    }
}
