//! Produced files and their packaging category.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::AspectRatio;

/// Logical kind of a produced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    Clip,
    Loop,
    Still,
    Short,
}

impl ArtifactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactCategory::Clip => "clips",
            ArtifactCategory::Loop => "loops",
            ArtifactCategory::Still => "stills",
            ArtifactCategory::Short => "shorts",
        }
    }
}

/// One produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifact {
    pub category: ArtifactCategory,
    /// Set for clips only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    pub path: PathBuf,
}

impl OutputArtifact {
    pub fn clip(ratio: AspectRatio, path: PathBuf) -> Self {
        Self { category: ArtifactCategory::Clip, aspect_ratio: Some(ratio), path }
    }

    pub fn new(category: ArtifactCategory, path: PathBuf) -> Self {
        Self { category, aspect_ratio: None, path }
    }

    /// Folder inside the archive (`clips/9x16`, `loops`, ...).
    pub fn archive_folder(&self) -> String {
        match (self.category, self.aspect_ratio) {
            (ArtifactCategory::Clip, Some(ratio)) => format!("clips/{}", ratio.tag()),
            (category, _) => category.as_str().to_string(),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_folders() {
        let clip = OutputArtifact::clip(AspectRatio::Vertical, PathBuf::from("/w/a_clip01_9x16.mp4"));
        assert_eq!(clip.archive_folder(), "clips/9x16");
        assert_eq!(clip.file_name(), Some("a_clip01_9x16.mp4"));

        let still = OutputArtifact::new(ArtifactCategory::Still, PathBuf::from("/w/s.jpg"));
        assert_eq!(still.archive_folder(), "stills");
    }
}
