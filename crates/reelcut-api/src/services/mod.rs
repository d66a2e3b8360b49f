//! Background services.

pub mod janitor;
pub mod probe;

pub use janitor::{Janitor, SweepReport};
pub use probe::{probe_and_record, spawn_probe};
