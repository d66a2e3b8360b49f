//! Job status snapshots for progress polling.
//!
//! A `JobSnapshot` is the full live record of one job. The jobs crate keeps it
//! behind a lock and hands out clones to pollers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::artifact::OutputArtifact;
use crate::video::VideoId;

/// Highest percentage reported before the archive is packaged.
pub const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Note appended to the error list when a job is cancelled.
pub const CANCELLED_NOTE: &str = "Processing cancelled by user";

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Work units are still being dispatched or running
    #[default]
    Processing,
    /// Archive packaged, at least one artifact produced
    Completed,
    /// Cancelled, or nothing could be produced
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live progress record for one job, keyed by source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub video_id: VideoId,
    pub status: JobStatus,
    /// Expected number of work units
    pub total_units: u32,
    /// Units finished, successfully or not
    pub completed_units: u32,
    /// Progress percentage (0-100), never decreases
    pub percent: u8,
    /// Per-unit failures and notes
    pub errors: Vec<String>,
    /// Produced files
    pub outputs: Vec<OutputArtifact>,
    /// Download route for the packaged archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_path: Option<String>,
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn new(video_id: VideoId, total_units: u32) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            status: JobStatus::Processing,
            total_units,
            completed_units: 0,
            percent: 0,
            errors: Vec::new(),
            outputs: Vec::new(),
            download_path: None,
            cancel_requested: false,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Count one finished unit and recompute the percentage.
    pub fn record_unit(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.completed_units = (self.completed_units + 1).min(self.total_units.max(1));
        self.refresh_percent();
    }

    fn refresh_percent(&mut self) {
        let computed = if self.total_units == 0 {
            0
        } else {
            (self.completed_units as u64 * 100 / self.total_units as u64) as u8
        };
        self.percent = self.percent.max(computed.min(MAX_IN_FLIGHT_PERCENT));
        self.updated_at = Utc::now();
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.updated_at = Utc::now();
    }

    pub fn push_output(&mut self, artifact: OutputArtifact) {
        self.outputs.push(artifact);
        self.updated_at = Utc::now();
    }

    /// Mark job as completed with its archive location.
    pub fn complete(&mut self, download_path: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.percent = 100;
        self.download_path = Some(download_path.into());
        self.updated_at = Utc::now();
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.errors.push(error.into());
        self.updated_at = Utc::now();
    }

    /// Flag cancellation. Returns `false` when the job had already finished.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.cancel_requested = true;
        self.status = JobStatus::Error;
        self.errors.push(CANCELLED_NOTE.to_string());
        self.updated_at = Utc::now();
        true
    }

    /// Seconds since the last update.
    pub fn idle_secs(&self) -> i64 {
        (Utc::now() - self.updated_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let job = JobSnapshot::new(VideoId::from("v"), 4);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.percent, 0);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_percent_capped_until_complete() {
        let mut job = JobSnapshot::new(VideoId::from("v"), 2);
        job.record_unit();
        assert_eq!(job.percent, 50);
        job.record_unit();
        assert_eq!(job.percent, MAX_IN_FLIGHT_PERCENT);
        job.record_unit();
        assert_eq!(job.completed_units, 2);

        job.complete("/api/download/v");
        assert_eq!(job.percent, 100);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_cancel_is_idempotent_on_terminal() {
        let mut job = JobSnapshot::new(VideoId::from("v"), 1);
        assert!(job.cancel());
        assert_eq!(job.status, JobStatus::Error);
        assert!(!job.cancel());
        assert_eq!(job.errors, vec![CANCELLED_NOTE.to_string()]);
    }

    #[test]
    fn test_serialized_field_names() {
        let job = JobSnapshot::new(VideoId::from("v"), 3);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["totalUnits"], 3);
        assert_eq!(json["completedUnits"], 0);
        assert_eq!(json["status"], "processing");
        assert!(json.get("downloadPath").is_none());
    }
}
