//! Local storage for reelcut.
//!
//! This crate provides:
//! - Whole-file and chunked upload ingestion with a free-space precondition
//! - Retention sweeps for stale sessions and expired uploads
//! - A keyed record store for the video catalog
//! - Archive packaging of derived artifacts

pub mod archive;
pub mod config;
pub mod disk;
pub mod error;
pub mod records;
pub mod stream;
pub mod uploads;

pub use archive::{archive_name, package, remove_job_archive, ArchiveInfo};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use records::{MemoryRecordStore, RecordStore};
pub use stream::stream_to_file;
pub use uploads::{ChunkReceipt, ReclaimReport, UploadAssembler};
