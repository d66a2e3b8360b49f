//! Upload ingestion: whole-file uploads and chunked upload sessions.
//!
//! Chunks are streamed straight to a per-session staging directory as
//! `chunk_000000`, `chunk_000001`, ... so a directory listing sorts in byte
//! order. Finalize is single-winner per session: the in-progress flag is
//! checked and set under the session lock before any file I/O starts.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use futures::Stream;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use reelcut_models::utils::file_extension;
use reelcut_models::{sanitize_path_component, SourceVideo, VideoId};

use crate::config::StorageConfig;
use crate::disk::ensure_capacity;
use crate::error::{StorageError, StorageResult};
use crate::stream::stream_to_file;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Staging file name for a chunk index.
pub fn chunk_file_name(index: u32) -> String {
    format!("chunk_{:06}", index)
}

#[derive(Debug)]
struct UploadSession {
    file_name: String,
    total_chunks: u32,
    /// Bytes stored per received chunk index
    received: BTreeMap<u32, u64>,
    staging_dir: PathBuf,
    finalizing: bool,
    last_activity: Instant,
}

impl UploadSession {
    fn bytes_received(&self) -> u64 {
        self.received.values().sum()
    }
}

/// State of a session after a chunk was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    pub upload_id: String,
    pub chunk_index: u32,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub bytes_received: u64,
    pub complete: bool,
}

/// Outcome of a retention sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
    pub sessions: usize,
    pub orphaned_dirs: usize,
}

/// Accepts uploads and assembles chunked sessions into source files.
#[derive(Debug)]
pub struct UploadAssembler {
    config: StorageConfig,
    sessions: Mutex<HashMap<String, UploadSession>>,
}

impl UploadAssembler {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Store a whole file in one request.
    ///
    /// The upload is refused unless the configured multiple of `declared_size`
    /// is free on disk. Callers without a declared size pass their upper bound.
    pub async fn store_upload<S, E>(
        &self,
        original_name: &str,
        declared_size: u64,
        body: S,
    ) -> StorageResult<SourceVideo>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let uploads_dir = self.config.uploads_dir();
        tokio::fs::create_dir_all(&uploads_dir).await?;

        ensure_capacity(&uploads_dir, declared_size, self.config.disk_space_factor)?;

        let (id, filename, path) = self.destination(original_name);
        let size = stream_to_file(&path, body).await?;

        info!(video_id = %id, size, "Stored whole-file upload");
        counter!("reelcut_uploads_total", "mode" => "direct").increment(1);

        Ok(SourceVideo::new(id, filename, original_name, path, size))
    }

    /// Persist one chunk, creating the session on first sight of `upload_id`.
    pub async fn write_chunk<S, E>(
        &self,
        upload_id: &str,
        chunk_index: u32,
        total_chunks: u32,
        file_name: &str,
        body: S,
    ) -> StorageResult<ChunkReceipt>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        validate_upload_id(upload_id)?;
        if total_chunks == 0 {
            return Err(StorageError::invalid_chunk("totalChunks must be at least 1"));
        }
        if chunk_index >= total_chunks {
            return Err(StorageError::invalid_chunk(format!(
                "chunk index {} exceeds total chunks {}",
                chunk_index, total_chunks
            )));
        }

        let staging_dir = {
            let mut sessions = self.sessions.lock();
            let session = sessions.entry(upload_id.to_string()).or_insert_with(|| {
                debug!(upload_id, total_chunks, "Opening upload session");
                UploadSession {
                    file_name: file_name.to_string(),
                    total_chunks,
                    received: BTreeMap::new(),
                    staging_dir: self.config.chunks_dir().join(upload_id),
                    finalizing: false,
                    last_activity: Instant::now(),
                }
            });
            if session.finalizing {
                return Err(StorageError::FinalizeInProgress(upload_id.to_string()));
            }
            if session.total_chunks != total_chunks {
                return Err(StorageError::invalid_chunk(format!(
                    "totalChunks changed from {} to {}",
                    session.total_chunks, total_chunks
                )));
            }
            session.last_activity = Instant::now();
            session.staging_dir.clone()
        };

        tokio::fs::create_dir_all(&staging_dir).await?;
        let chunk_path = staging_dir.join(chunk_file_name(chunk_index));
        let written = stream_to_file(&chunk_path, body).await?;

        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(upload_id) else {
            // Reclaimed while the chunk was in flight.
            return Err(StorageError::SessionNotFound(upload_id.to_string()));
        };
        session.received.insert(chunk_index, written);
        session.last_activity = Instant::now();

        let received_chunks = session.received.len() as u32;
        debug!(upload_id, chunk_index, received_chunks, total_chunks, "Chunk stored");

        Ok(ChunkReceipt {
            upload_id: upload_id.to_string(),
            chunk_index,
            received_chunks,
            total_chunks,
            bytes_received: session.bytes_received(),
            complete: received_chunks == total_chunks,
        })
    }

    /// Concatenate all chunks of `upload_id` into a new source file.
    ///
    /// A size check is applied when `declared_size` is given. On any failure
    /// the partial destination, the staging directory and the session are
    /// all removed.
    pub async fn finalize(
        &self,
        upload_id: &str,
        file_name: &str,
        declared_size: Option<u64>,
    ) -> StorageResult<SourceVideo> {
        let (staging_dir, total_chunks, session_name) = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(upload_id)
                .ok_or_else(|| StorageError::SessionNotFound(upload_id.to_string()))?;
            if session.finalizing {
                return Err(StorageError::FinalizeInProgress(upload_id.to_string()));
            }
            let received = session.received.len() as u32;
            if received != session.total_chunks {
                return Err(StorageError::IncompleteUpload {
                    received,
                    expected: session.total_chunks,
                });
            }
            session.finalizing = true;
            session.last_activity = Instant::now();
            (
                session.staging_dir.clone(),
                session.total_chunks,
                session.file_name.clone(),
            )
        };

        let original_name = if file_name.trim().is_empty() {
            session_name
        } else {
            file_name.to_string()
        };

        let uploads_dir = self.config.uploads_dir();
        let (id, filename, path) = self.destination(&original_name);

        let result: StorageResult<u64> = async {
            tokio::fs::create_dir_all(&uploads_dir).await?;
            let size = concatenate_chunks(&staging_dir, total_chunks, &path).await?;
            if let Some(expected) = declared_size {
                if expected != size {
                    return Err(StorageError::SizeMismatch { expected, actual: size });
                }
            }
            Ok(size)
        }
        .await;

        remove_dir_quietly(&staging_dir).await;
        self.sessions.lock().remove(upload_id);

        match result {
            Ok(size) => {
                info!(upload_id, video_id = %id, size, chunks = total_chunks, "Upload finalized");
                counter!("reelcut_uploads_total", "mode" => "chunked").increment(1);
                Ok(SourceVideo::new(id, filename, original_name, path, size))
            }
            Err(e) => {
                warn!(upload_id, error = %e, "Finalize failed, discarding upload");
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    if rm.kind() != io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %rm, "Failed to remove partial upload");
                    }
                }
                Err(e)
            }
        }
    }

    /// Drop sessions idle for longer than `ttl`, along with staging
    /// directories that no session owns any more.
    pub async fn reclaim_stale(&self, ttl: Duration) -> StorageResult<ReclaimReport> {
        let (expired, live): (Vec<PathBuf>, Vec<String>) = {
            let mut sessions = self.sessions.lock();
            let expired_ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| !s.finalizing && s.last_activity.elapsed() > ttl)
                .map(|(id, _)| id.clone())
                .collect();
            let dirs = expired_ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .map(|s| s.staging_dir)
                .collect();
            (dirs, sessions.keys().cloned().collect())
        };

        let mut report = ReclaimReport {
            sessions: expired.len(),
            orphaned_dirs: 0,
        };
        for dir in &expired {
            remove_dir_quietly(dir).await;
        }

        let chunks_dir = self.config.chunks_dir();
        let mut entries = match tokio::fs::read_dir(&chunks_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if live.contains(&name) {
                continue;
            }
            if older_than(&entry.path(), ttl).await {
                remove_dir_quietly(&entry.path()).await;
                report.orphaned_dirs += 1;
            }
        }

        if report.sessions > 0 || report.orphaned_dirs > 0 {
            info!(
                sessions = report.sessions,
                orphaned_dirs = report.orphaned_dirs,
                "Reclaimed stale upload sessions"
            );
        }
        Ok(report)
    }

    /// Delete completed uploads older than `retention`. Returns removed paths.
    pub async fn purge_old_uploads(&self, retention: Duration) -> StorageResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.config.uploads_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !older_than(&path, retention).await {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed.push(path),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to purge upload"),
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Purged expired uploads");
        }
        Ok(removed)
    }

    fn destination(&self, original_name: &str) -> (VideoId, String, PathBuf) {
        let id = VideoId::new();
        let filename = format!("{}.{}", id, file_extension(original_name));
        let path = self.config.uploads_dir().join(&filename);
        (id, filename, path)
    }
}

fn validate_upload_id(upload_id: &str) -> StorageResult<()> {
    match sanitize_path_component(upload_id) {
        Some(clean) if clean == upload_id && !upload_id.starts_with('.') => Ok(()),
        _ => Err(StorageError::InvalidUploadId(upload_id.to_string())),
    }
}

async fn concatenate_chunks(staging_dir: &Path, total_chunks: u32, dest: &Path) -> StorageResult<u64> {
    let mut out = BufWriter::new(File::create(dest).await?);
    let mut written = 0u64;

    for index in 0..total_chunks {
        let chunk_path = staging_dir.join(chunk_file_name(index));
        let mut chunk = match File::open(&chunk_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::MissingChunk(index));
            }
            Err(e) => return Err(e.into()),
        };
        written += tokio::io::copy(&mut chunk, &mut out).await?;
    }

    out.flush().await?;
    out.into_inner().sync_all().await?;
    Ok(written)
}

async fn older_than(path: &Path, age: Duration) -> bool {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed > age)
}

async fn remove_dir_quietly(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(data: &[u8]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(vec![Ok(Bytes::copy_from_slice(data))])
    }

    fn assembler(dir: &Path) -> UploadAssembler {
        UploadAssembler::new(StorageConfig::with_data_dir(dir))
    }

    fn sample() -> Vec<u8> {
        (0..5000u32).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_out_of_order_chunks_match_direct_upload() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        let data = sample();
        let parts: Vec<&[u8]> = data.chunks(1000).collect();
        assert_eq!(parts.len(), 5);

        for index in [3u32, 0, 4, 1, 2] {
            uploads
                .write_chunk("up-1", index, 5, "movie.mp4", body(parts[index as usize]))
                .await
                .unwrap();
        }
        let chunked = uploads.finalize("up-1", "movie.mp4", Some(5000)).await.unwrap();
        let direct = uploads
            .store_upload("movie.mp4", 5000, body(&data))
            .await
            .unwrap();

        assert_eq!(chunked.size, 5000);
        assert_eq!(
            tokio::fs::read(&chunked.path).await.unwrap(),
            tokio::fs::read(&direct.path).await.unwrap()
        );
        assert_eq!(chunked.original_name, "movie.mp4");
        assert!(chunked.filename.ends_with(".mp4"));
        assert!(!dir.path().join("chunks/up-1").exists());
        assert_eq!(uploads.session_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_before_all_chunks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        uploads.write_chunk("up-2", 0, 3, "a.mp4", body(b"abc")).await.unwrap();
        let receipt = uploads.write_chunk("up-2", 2, 3, "a.mp4", body(b"ghi")).await.unwrap();
        assert_eq!(receipt.received_chunks, 2);
        assert!(!receipt.complete);

        let err = uploads.finalize("up-2", "a.mp4", None).await.unwrap_err();
        assert!(matches!(err, StorageError::IncompleteUpload { received: 2, expected: 3 }));
        // The session survives so the client can resume.
        assert_eq!(uploads.session_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_has_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        uploads.write_chunk("up-3", 0, 2, "a.mp4", body(b"first")).await.unwrap();
        uploads.write_chunk("up-3", 1, 2, "a.mp4", body(b"second")).await.unwrap();

        let (a, b) = tokio::join!(
            uploads.finalize("up-3", "a.mp4", None),
            uploads.finalize("up-3", "a.mp4", None)
        );
        let (ok, conflict) = if a.is_ok() { (a, b) } else { (b, a) };

        let video = ok.unwrap();
        assert!(matches!(conflict, Err(StorageError::FinalizeInProgress(_))));
        assert_eq!(tokio::fs::read(&video.path).await.unwrap(), b"firstsecond");

        let mut files = std::fs::read_dir(dir.path().join("uploads")).unwrap();
        assert!(files.next().is_some());
        assert!(files.next().is_none());
    }

    #[tokio::test]
    async fn test_missing_chunk_file_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        uploads.write_chunk("up-4", 0, 2, "a.mp4", body(b"one")).await.unwrap();
        uploads.write_chunk("up-4", 1, 2, "a.mp4", body(b"two")).await.unwrap();
        std::fs::remove_file(dir.path().join("chunks/up-4").join(chunk_file_name(1))).unwrap();

        let err = uploads.finalize("up-4", "a.mp4", None).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingChunk(1)));
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
        assert!(!dir.path().join("chunks/up-4").exists());
        assert!(matches!(
            uploads.finalize("up-4", "a.mp4", None).await,
            Err(StorageError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_size_mismatch_discards_output() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        uploads.write_chunk("up-5", 0, 1, "a.mp4", body(b"12345")).await.unwrap();

        let err = uploads.finalize("up-5", "a.mp4", Some(10)).await.unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { expected: 10, actual: 5 }));
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_chunk_validation() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());

        assert!(matches!(
            uploads.write_chunk("../etc", 0, 1, "a.mp4", body(b"x")).await,
            Err(StorageError::InvalidUploadId(_))
        ));
        assert!(matches!(
            uploads.write_chunk("ok", 3, 3, "a.mp4", body(b"x")).await,
            Err(StorageError::InvalidChunk(_))
        ));
        uploads.write_chunk("ok", 0, 3, "a.mp4", body(b"x")).await.unwrap();
        assert!(matches!(
            uploads.write_chunk("ok", 1, 4, "a.mp4", body(b"x")).await,
            Err(StorageError::InvalidChunk(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_sessions_are_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        uploads.write_chunk("old", 0, 2, "a.mp4", body(b"x")).await.unwrap();
        std::fs::create_dir_all(dir.path().join("chunks/orphan")).unwrap();

        let kept = uploads.reclaim_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(kept, ReclaimReport::default());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = uploads.reclaim_stale(Duration::from_millis(1)).await.unwrap();
        assert_eq!(report.sessions, 1);
        assert_eq!(report.orphaned_dirs, 1);
        assert_eq!(uploads.session_count(), 0);
        assert!(!dir.path().join("chunks/old").exists());
        assert!(!dir.path().join("chunks/orphan").exists());
    }

    #[tokio::test]
    async fn test_purge_old_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        let video = uploads.store_upload("a.mov", 4, body(b"data")).await.unwrap();
        assert!(video.filename.ends_with(".mov"));

        assert!(uploads.purge_old_uploads(Duration::from_secs(3600)).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = uploads.purge_old_uploads(Duration::from_millis(1)).await.unwrap();
        assert_eq!(removed, vec![video.path.clone()]);
        assert!(!video.path.exists());
    }

    #[tokio::test]
    async fn test_direct_upload_refused_without_space() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = assembler(dir.path());
        let err = uploads
            .store_upload("big.mp4", u64::MAX / 4, body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InsufficientDiskSpace { .. }));
    }
}
