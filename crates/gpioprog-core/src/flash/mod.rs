//! Flash write operations
//!
//! The sector writer in [`sector`] is the only place that erases or
//! programs. It reports what it is doing through [`WriteProgress`].

mod progress;
pub mod sector;

pub use progress::{NoProgress, SessionProgress, WriteProgress};
pub use sector::{write_sector, SectorPhase, SectorStats, WriteOptions};
