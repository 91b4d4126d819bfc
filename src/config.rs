//! Run configuration shared by the CLI and the solver.

use crate::topology::Level;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REPLICATION_FACTOR: usize = 3;
pub const DEFAULT_FILL_LEVEL: f64 = 0.8;
pub const MAX_OVERLAP_TOLERANCE: usize = 2;
pub const SEED_REPAIR_CUTOFF: usize = 200;

/// Impossible problem statements. Fatal: reported before any attempt starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("replication factor must be at least 1")]
    ZeroReplicationFactor,

    /// Replicas always live in one zone, so the zone itself can never be the disjoint scope.
    #[error("partitions cannot be disjoint across the whole zone")]
    DisjointZone,

    #[error("locations of one disk cannot be made disjoint")]
    DisjointLocation,

    #[error("fill level {0} must be in (0, 1]")]
    FillLevel(f64),

    #[error("initial overlap tolerance {initial} exceeds the maximum {max}")]
    OverlapTolerance { initial: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Hosts every partition must reach.
    pub replication_factor: usize,
    /// Share of each disk's locations made available to placement.
    pub fill_level: f64,
    pub initial_overlap_tolerance: usize,
    /// The escalation loop gives up once the tolerance would exceed this.
    pub max_overlap_tolerance: usize,
    pub initial_disjoint_level: Level,
    pub initial_target: usize,
    /// Swapping in the seed step stops above this many unsatisfied replicas.
    pub seed_repair_cutoff: usize,
    /// Failures after which one attempt stops with `LimitReached`.
    pub fail_limit: u64,
    /// Safety cap on escalation iterations.
    pub max_iterations: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            fill_level: DEFAULT_FILL_LEVEL,
            initial_overlap_tolerance: 1,
            max_overlap_tolerance: MAX_OVERLAP_TOLERANCE,
            initial_disjoint_level: Level::Rack,
            initial_target: 0,
            seed_repair_cutoff: SEED_REPAIR_CUTOFF,
            fail_limit: 100_000,
            max_iterations: 10_000,
        }
    }
}

impl AllocatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replication_factor == 0 {
            return Err(ConfigError::ZeroReplicationFactor);
        }
        match self.initial_disjoint_level {
            Level::Zone => return Err(ConfigError::DisjointZone),
            Level::Location => return Err(ConfigError::DisjointLocation),
            _ => {}
        }
        if !(self.fill_level > 0.0 && self.fill_level <= 1.0) {
            return Err(ConfigError::FillLevel(self.fill_level));
        }
        if self.initial_overlap_tolerance > self.max_overlap_tolerance {
            return Err(ConfigError::OverlapTolerance {
                initial: self.initial_overlap_tolerance,
                max: self.max_overlap_tolerance,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AllocatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.initial_disjoint_level, Level::Rack);
    }

    #[test]
    fn test_rejects_impossible_settings() {
        let zone = AllocatorConfig {
            initial_disjoint_level: Level::Zone,
            ..Default::default()
        };
        assert_eq!(zone.validate(), Err(ConfigError::DisjointZone));

        let location = AllocatorConfig {
            initial_disjoint_level: Level::Location,
            ..Default::default()
        };
        assert_eq!(location.validate(), Err(ConfigError::DisjointLocation));

        let fill = AllocatorConfig {
            fill_level: 1.5,
            ..Default::default()
        };
        assert_eq!(fill.validate(), Err(ConfigError::FillLevel(1.5)));

        let overlap = AllocatorConfig {
            initial_overlap_tolerance: 3,
            ..Default::default()
        };
        assert!(matches!(overlap.validate(), Err(ConfigError::OverlapTolerance { .. })));

        let rf = AllocatorConfig {
            replication_factor: 0,
            ..Default::default()
        };
        assert_eq!(rf.validate(), Err(ConfigError::ZeroReplicationFactor));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AllocatorConfig =
            serde_json::from_str(r#"{"fill_level": 0.5, "initial_disjoint_level": "host"}"#).unwrap();
        assert_eq!(config.fill_level, 0.5);
        assert_eq!(config.initial_disjoint_level, Level::Host);
        assert_eq!(config.max_overlap_tolerance, 2);
    }
}
