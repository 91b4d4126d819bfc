use super::types::VarId;
use serde::Serialize;
use thiserror::Error;

/// Why a domain operation or propagator found the current state infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContradictionReason {
    /// Forcing a value that was already removed from the possible set.
    #[error("value {value} is not possible")]
    NotPossible { value: usize },

    /// Removing a value that is already committed.
    #[error("value {value} is already committed")]
    AlreadyCommitted { value: usize },

    #[error("committing value {value} exceeds capacity {capacity}")]
    CapacityExceeded { value: usize, capacity: usize },

    /// A committed value has no child left that could hold it.
    #[error("no child can hold committed value {value}")]
    NoSupport { value: usize },

    #[error("partition {value} already has {hosts} hosts")]
    ReplicationExceeded { value: usize, hosts: usize },

    #[error("disk shares {shared} partitions with disk {other}, tolerance is {tolerance}")]
    OverlapExceeded {
        other: usize,
        shared: usize,
        tolerance: usize,
    },

    #[error("objective bound {bound} is below target {target}")]
    ObjectiveUnreachable { bound: usize, target: usize },
}

/// A propagation failure. Carries the variable it was detected on, when there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("contradiction on {var:?}: {reason}")]
pub struct Contradiction {
    pub var: Option<VarId>,
    pub reason: ContradictionReason,
}

impl Contradiction {
    pub fn on(var: VarId, reason: ContradictionReason) -> Self {
        Self {
            var: Some(var),
            reason,
        }
    }

    pub fn global(reason: ContradictionReason) -> Self {
        Self { var: None, reason }
    }
}
