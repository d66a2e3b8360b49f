//! Source video identity and catalog record.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an ingested source video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An uploaded source file.
///
/// Created when an upload completes. `duration` is filled in once by the
/// background probe; afterwards only `processed` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceVideo {
    pub id: VideoId,
    /// Stored filename (`<id>.<ext>`)
    pub filename: String,
    /// Filename as supplied by the uploader
    pub original_name: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Duration in seconds, `None` until probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl SourceVideo {
    pub fn new(
        id: VideoId,
        filename: impl Into<String>,
        original_name: impl Into<String>,
        path: PathBuf,
        size: u64,
    ) -> Self {
        Self {
            id,
            filename: filename.into(),
            original_name: original_name.into(),
            path,
            size,
            duration: None,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Record the probed duration. Returns `false` if it was already set.
    pub fn set_duration_once(&mut self, duration: f64) -> bool {
        if self.duration.is_some() {
            return false;
        }
        self.duration = Some(duration);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_set_once() {
        let mut video = SourceVideo::new(
            VideoId::from("v1"),
            "v1.mp4",
            "Holiday.mp4",
            PathBuf::from("/tmp/v1.mp4"),
            1024,
        );
        assert!(video.set_duration_once(42.5));
        assert!(!video.set_duration_once(10.0));
        assert_eq!(video.duration, Some(42.5));
    }

    #[test]
    fn test_serializes_camel_case() {
        let video = SourceVideo::new(VideoId::from("v1"), "v1.mp4", "a.mp4", PathBuf::from("x"), 1);
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["originalName"], "a.mp4");
        assert!(json.get("duration").is_none());
        assert_eq!(json["id"], "v1");
    }
}
