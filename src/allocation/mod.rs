//! Allocation Snapshot Module
//!
//! Everything that describes a concrete placement of partitions, independent of how it was
//! found.
//!
//! ## Core Concepts
//! - **Partition universe**: partitions are numbered `0..P` internally with
//!   `P = zone capacity / replication factor`; external ids are offset so a prior allocation keeps
//!   its numbering.
//! - **Snapshot**: a location → partition map. Loaded from the prior allocation file, rolled up
//!   from each solved attempt (keeping unchanged partitions in place), and written back out.
//! - **Diff & stats**: movement between snapshots and quality numbers, logged per attempt.

pub mod diff;
pub mod snapshot;
pub mod stats;
pub mod universe;

pub use diff::{AllocationDiff, DiskChange, format_ranges};
pub use snapshot::{Allocation, LoadReport};
pub use stats::{AllocationStats, DiskFill};
pub use universe::PartitionUniverse;
