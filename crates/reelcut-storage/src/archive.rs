//! Archive packaging of derived artifacts.
//!
//! Every job gets one canonical archive under `archives/<job_key>/`. Entries
//! are grouped by category folder (`clips/16x9`, `clips/9x16`, `loops`,
//! `stills`, `shorts`). Media is already compressed, so entries are stored.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use reelcut_models::{ArtifactCategory, OutputArtifact};

use crate::error::{StorageError, StorageResult};

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub entries: usize,
    pub size: u64,
}

/// Archive file name for the categories present in `artifacts`.
///
/// Clips take precedence, then shorts; several export categories without
/// clips or shorts share a combined name; otherwise the single category names
/// the archive.
pub fn archive_name(base: &str, artifacts: &[OutputArtifact]) -> String {
    let has = |category: ArtifactCategory| artifacts.iter().any(|a| a.category == category);

    let suffix = if has(ArtifactCategory::Clip) {
        "clips"
    } else if has(ArtifactCategory::Short) {
        "shorts"
    } else if has(ArtifactCategory::Loop) && has(ArtifactCategory::Still) {
        "exports"
    } else if has(ArtifactCategory::Loop) {
        "loops"
    } else {
        "stills"
    };
    format!("{}_{}.zip", base, suffix)
}

/// Directory holding the archive for `job_key`.
pub fn job_archive_dir(archives_dir: &Path, job_key: &str) -> PathBuf {
    archives_dir.join(job_key)
}

/// Write every existing artifact into a single archive for `job_key`.
///
/// Artifacts whose files vanished are skipped with a warning; if none are
/// left the call fails with [`StorageError::NothingToPackage`].
pub async fn package(
    archives_dir: &Path,
    job_key: &str,
    base: &str,
    artifacts: &[OutputArtifact],
) -> StorageResult<ArchiveInfo> {
    let present: Vec<OutputArtifact> = artifacts
        .iter()
        .filter(|a| {
            let exists = a.path.is_file();
            if !exists {
                warn!(path = %a.path.display(), "Artifact missing at packaging time");
            }
            exists
        })
        .cloned()
        .collect();
    if present.is_empty() {
        return Err(StorageError::NothingToPackage);
    }

    let dir = job_archive_dir(archives_dir, job_key);
    tokio::fs::create_dir_all(&dir).await?;
    let file_name = archive_name(base, &present);
    let path = dir.join(&file_name);

    let target = path.clone();
    let entries = tokio::task::spawn_blocking(move || write_archive(&target, &present))
        .await
        .map_err(|e| StorageError::Archive(format!("packaging task failed: {}", e)))??;

    let size = tokio::fs::metadata(&path).await?.len();
    info!(job_key, archive = %file_name, entries, size, "Archive packaged");

    Ok(ArchiveInfo {
        path,
        file_name,
        entries,
        size,
    })
}

fn write_archive(path: &Path, artifacts: &[OutputArtifact]) -> StorageResult<usize> {
    let part = path.with_extension("zip.part");
    let result = write_entries(&part, artifacts);
    match result {
        Ok(count) => {
            std::fs::rename(&part, path)?;
            Ok(count)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&part);
            Err(e)
        }
    }
}

fn write_entries(part: &Path, artifacts: &[OutputArtifact]) -> StorageResult<usize> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(part)?));
    let mut used = HashSet::new();

    for artifact in artifacts {
        let name = artifact
            .file_name()
            .ok_or_else(|| StorageError::Archive(format!("unnamed artifact {}", artifact.path.display())))?;
        let entry = unique_entry(&mut used, &artifact.archive_folder(), name);

        let mut source = File::open(&artifact.path)?;
        let len = source.metadata()?.len();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(len >= ZIP64_THRESHOLD);

        zip.start_file(entry, options)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;
    Ok(used.len())
}

fn unique_entry(used: &mut HashSet<String>, folder: &str, name: &str) -> String {
    let candidate = format!("{}/{}", folder, name);
    if used.insert(candidate.clone()) {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{}/{}_{}{}", folder, stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Delete the archive directory of `job_key`.
pub async fn remove_job_archive(archives_dir: &Path, job_key: &str) -> StorageResult<()> {
    match tokio::fs::remove_dir_all(job_archive_dir(archives_dir, job_key)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_models::AspectRatio;

    fn artifact(category: ArtifactCategory) -> OutputArtifact {
        OutputArtifact::new(category, PathBuf::from("x"))
    }

    #[test]
    fn test_archive_name_precedence() {
        let clip = OutputArtifact::clip(AspectRatio::Landscape, PathBuf::from("c.mp4"));
        let loop_ = artifact(ArtifactCategory::Loop);
        let still = artifact(ArtifactCategory::Still);
        let short = artifact(ArtifactCategory::Short);

        assert_eq!(archive_name("trip", &[loop_.clone(), clip.clone(), short.clone()]), "trip_clips.zip");
        assert_eq!(archive_name("trip", &[still.clone(), short]), "trip_shorts.zip");
        assert_eq!(archive_name("trip", &[loop_.clone(), still.clone()]), "trip_exports.zip");
        assert_eq!(archive_name("trip", &[loop_]), "trip_loops.zip");
        assert_eq!(archive_name("trip", &[still]), "trip_stills.zip");
    }

    #[test]
    fn test_duplicate_entries_get_suffix() {
        let mut used = HashSet::new();
        assert_eq!(unique_entry(&mut used, "stills", "a.jpg"), "stills/a.jpg");
        assert_eq!(unique_entry(&mut used, "stills", "a.jpg"), "stills/a_2.jpg");
        assert_eq!(unique_entry(&mut used, "loops", "a.jpg"), "loops/a.jpg");
    }

    #[tokio::test]
    async fn test_package_mirrors_category_folders() {
        let work = tempfile::tempdir().unwrap();
        let archives = tempfile::tempdir().unwrap();

        let mut artifacts = Vec::new();
        for (name, ratio) in [("a_clip01_16x9.mp4", AspectRatio::Landscape), ("a_clip01_9x16.mp4", AspectRatio::Vertical)] {
            let path = work.path().join(name);
            std::fs::write(&path, name).unwrap();
            artifacts.push(OutputArtifact::clip(ratio, path));
        }
        let still = work.path().join("a_still01.jpg");
        std::fs::write(&still, b"jpeg").unwrap();
        artifacts.push(OutputArtifact::new(ArtifactCategory::Still, still));
        artifacts.push(OutputArtifact::new(ArtifactCategory::Loop, work.path().join("gone.gif")));

        let info = package(archives.path(), "video-1", "a", &artifacts).await.unwrap();
        assert_eq!(info.file_name, "a_clips.zip");
        assert_eq!(info.entries, 3);
        assert_eq!(info.path, archives.path().join("video-1").join("a_clips.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&info.path).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["clips/16x9/a_clip01_16x9.mp4", "clips/9x16/a_clip01_9x16.mp4", "stills/a_still01.jpg"]
        );
        let mut contents = String::new();
        io::Read::read_to_string(&mut zip.by_name("stills/a_still01.jpg").unwrap(), &mut contents).unwrap();
        assert_eq!(contents, "jpeg");

        remove_job_archive(archives.path(), "video-1").await.unwrap();
        assert!(!info.path.exists());
    }

    #[tokio::test]
    async fn test_nothing_to_package() {
        let archives = tempfile::tempdir().unwrap();
        let err = package(archives.path(), "v", "a", &[artifact(ArtifactCategory::Still)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NothingToPackage));
    }
}
