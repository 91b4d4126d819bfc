//! Failure-Domain Topology Module
//!
//! Models the static hierarchy of allocation units a zone is built from:
//! Zone → Rack → Chassis → Host → Disk → Location.
//!
//! ## Core Concepts
//! - **Level**: a closed enum of node kinds. All units share one node type and differ only in
//!   their `Level` tag, capacity and indexing.
//! - **Global index**: every unit gets a dense, zero-based index within its level. Units are
//!   created depth-first, so the disks (and locations) below any unit form a contiguous range.
//! - **Back-references**: parents are stored as indices into the parent level, never as owning
//!   edges, which keeps the tree acyclic and cheap to clone.
//!
//! ## Submodules
//! - **`types`**: `Level`, `UnitRef` and `AllocationUnit`.
//! - **`zone`**: the built `Zone` tree with lookups and disjoint-group queries.
//! - **`loader`**: topology input (JSON or `.top` text) and fill-level scaling.

pub mod loader;
pub mod types;
pub mod zone;

pub use loader::{ChassisSpec, HostSpec, RackSpec, TopologySpec, zone_name_from_path};
pub use types::{AllocationUnit, Level, UnitRef};
pub use zone::Zone;

#[cfg(test)]
mod tests;
