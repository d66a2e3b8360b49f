//! Free-space checks for incoming uploads.

use std::path::Path;

use nix::sys::statvfs::statvfs;

use crate::error::{StorageError, StorageResult};

/// Bytes available to unprivileged users on the filesystem holding `path`.
pub fn available_space(path: &Path) -> StorageResult<u64> {
    let stat = statvfs(path).map_err(std::io::Error::from)?;
    Ok((stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64))
}

/// Refuse an upload of `declared` bytes unless `factor` times that is free.
pub fn ensure_capacity(path: &Path, declared: u64, factor: u64) -> StorageResult<()> {
    let required = declared.saturating_mul(factor.max(1));
    let available = available_space(path)?;
    if available < required {
        return Err(StorageError::InsufficientDiskSpace { required, available });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_upload_fits() {
        let dir = tempfile::tempdir().unwrap();
        assert!(available_space(dir.path()).unwrap() > 0);
        tokio_test::assert_ok!(ensure_capacity(dir.path(), 1024, 2));
    }

    #[test]
    fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_capacity(dir.path(), u64::MAX / 2, 2).unwrap_err();
        assert!(matches!(err, StorageError::InsufficientDiskSpace { .. }));
    }
}
