//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::StorageResult;

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory; `uploads/`, `chunks/` and `archives/` live below it
    pub data_dir: PathBuf,
    /// Idle time after which an unfinished upload session is reclaimed
    pub session_ttl: Duration,
    /// Age after which completed uploads are deleted
    pub upload_retention: Duration,
    /// How often the retention janitor runs
    pub janitor_interval: Duration,
    /// Free space required as a multiple of the declared upload size
    pub disk_space_factor: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/reelcut"),
            session_ttl: Duration::from_secs(3600),
            upload_retention: Duration::from_secs(86400),
            janitor_interval: Duration::from_secs(900),
            disk_space_factor: 2,
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            session_ttl: Duration::from_secs(
                std::env::var("UPLOAD_SESSION_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            upload_retention: Duration::from_secs(
                std::env::var("UPLOAD_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86400),
            ),
            janitor_interval: Duration::from_secs(
                std::env::var("JANITOR_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            disk_space_factor: std::env::var("DISK_SPACE_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    /// Config rooted at `data_dir` with default timings.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.data_dir.join("chunks")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.data_dir.join("archives")
    }

    /// Create the directory layout.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [self.uploads_dir(), self.chunks_dir(), self.archives_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}
