//! Shared data models for the reelcut backend.
//!
//! This crate provides Serde-serializable types for:
//! - Source videos and their catalog records
//! - Time ranges, including free-text parsing and validation
//! - Random "quick start" cut generation
//! - Work plans (cuts x aspect ratios plus export flags)
//! - Job status snapshots and output artifacts

pub mod artifact;
pub mod job_status;
pub mod plan;
pub mod random_cuts;
pub mod time_range;
pub mod timestamp;
pub mod utils;
pub mod video;

// Re-export common types
pub use artifact::{ArtifactCategory, OutputArtifact};
pub use job_status::{JobSnapshot, JobStatus};
pub use plan::{AspectRatio, FadeOptions, ProcessRequest, Quality, WorkPlan};
pub use random_cuts::{generate_random_cuts, generate_random_cuts_with_rng, CutProfile, RandomCutError};
pub use time_range::{parse_time_ranges, render_time_ranges, TimeRange, TimeRangeParseResult};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
pub use utils::{output_base_name, sanitize_filename_title, sanitize_path_component};
pub use video::{SourceVideo, VideoId};
