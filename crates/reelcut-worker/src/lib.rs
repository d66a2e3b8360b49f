//! Media derivation engine.
//!
//! This crate provides:
//! - Request validation into a work plan with a per-category unit budget
//! - Fan-out of clips, loops, stills and shorts against a `Transcoder`
//! - Per-unit failure isolation, cancellation and archive hand-off
//! - Structured job logging

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod plan;

pub use config::WorkerConfig;
pub use engine::{download_path, DerivationEngine, JobOutcome, PreparedJob};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use plan::{build_plan, PlannedWork, UnitCounts};
