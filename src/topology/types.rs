use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Depth of a unit in the failure-domain hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Zone = 0,
    Rack = 1,
    Chassis = 2,
    Host = 3,
    Disk = 4,
    Location = 5,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Zone,
        Level::Rack,
        Level::Chassis,
        Level::Host,
        Level::Disk,
        Level::Location,
    ];

    /// Levels that carry a set-domain variable during search.
    pub const VARIABLE_LEVELS: [Level; 5] = [
        Level::Zone,
        Level::Rack,
        Level::Chassis,
        Level::Host,
        Level::Disk,
    ];

    pub fn depth(self) -> usize {
        self as usize
    }

    pub fn from_depth(depth: usize) -> Option<Level> {
        Level::ALL.get(depth).copied()
    }

    pub fn parent(self) -> Option<Level> {
        self.depth().checked_sub(1).and_then(Level::from_depth)
    }

    pub fn child(self) -> Option<Level> {
        Level::from_depth(self.depth() + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Zone => "zone",
            Level::Rack => "rack",
            Level::Chassis => "chassis",
            Level::Host => "host",
            Level::Disk => "disk",
            Level::Location => "location",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown level '{}'", s))
    }
}

/// Non-owning handle to a unit: its level plus its global index within that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub level: Level,
    pub index: usize,
}

impl UnitRef {
    pub fn new(level: Level, index: usize) -> Self {
        Self { level, index }
    }
}

/// A node of the failure-domain hierarchy.
///
/// Built once by [`Zone::build`](super::Zone::build) and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationUnit {
    pub name: String,
    pub level: Level,
    /// Position among its siblings.
    pub local_index: usize,
    /// Dense index within its level.
    pub global_index: usize,
    /// Global index of the parent in the parent level. `None` only for the zone.
    pub parent: Option<usize>,
    /// Global indices of the children in the child level, in declaration order.
    pub children: Vec<usize>,
    /// Number of Location descendants.
    pub capacity: usize,
    /// Disks below (or equal to) this unit, as global disk indices.
    pub disks: Range<usize>,
    /// Locations below (or equal to) this unit, as global location indices.
    pub locations: Range<usize>,
}

impl AllocationUnit {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef::new(self.level, self.global_index)
    }
}

impl fmt::Display for AllocationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
