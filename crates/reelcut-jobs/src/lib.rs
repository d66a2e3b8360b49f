//! In-process job tracking.
//!
//! This crate provides:
//! - A registry of live jobs keyed by source video, one live job per video
//! - Serialized progress accounting shared by concurrent work units
//! - Cancellation signalling to running work units

pub mod error;
pub mod registry;

pub use error::{JobError, JobResult};
pub use registry::{JobHandle, JobRegistry};
