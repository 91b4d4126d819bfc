//! Partition Allocator Library
//!
//! This library crate places replicated partitions onto the disks of a storage zone so that
//! replicas of one partition never share a failure domain, and re-places them with minimal
//! movement when the topology changes. It serves as the foundation for the binary executable
//! (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four subsystems:
//!
//! - **`topology`**: The failure-domain tree. Loads JSON and `.top` topology files, applies the
//!   fill level, and flattens Zone/Rack/Chassis/Host/Disk/Location into indexed arrays.
//! - **`allocation`**: Placement snapshots. Reads and writes the per-disk JSON form, rolls a
//!   solution up onto locations, and computes diffs and statistics between snapshots.
//! - **`solver`**: The constraint engine. Set-domain variables with a trail, hierarchy and
//!   overlap propagators, a seed/repair pass, depth-first search and the escalation driver.
//! - **`config`**: Run parameters and their validation.

pub mod allocation;
pub mod config;
pub mod solver;
pub mod topology;
