use super::error::Contradiction;
use crate::topology::{Level, UnitRef, Zone};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Dense id of a set-domain variable. One variable per unit at levels Zone..Disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Change notification queued by the domain store and drained by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    /// `value` entered the committed set of `var`.
    Forced { var: VarId, value: usize },
    /// `value` left the possible set of `var`.
    Removed { var: VarId, value: usize },
}

impl DomainEvent {
    pub fn var(&self) -> VarId {
        match *self {
            DomainEvent::Forced { var, .. } | DomainEvent::Removed { var, .. } => var,
        }
    }
}

/// Maps units to variables: each variable level occupies a contiguous block of ids, in level
/// order, and within a block ids follow the unit's global index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarLayout {
    offsets: [usize; 5],
    counts: [usize; 5],
}

impl VarLayout {
    pub fn new(zone: &Zone) -> Self {
        let mut offsets = [0; 5];
        let mut counts = [0; 5];
        let mut next = 0;
        for level in Level::VARIABLE_LEVELS {
            offsets[level.depth()] = next;
            counts[level.depth()] = zone.count(level);
            next += counts[level.depth()];
        }
        Self { offsets, counts }
    }

    pub fn len(&self) -> usize {
        self.offsets[4] + self.counts[4]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variable of a unit. Locations carry no variable.
    pub fn var(&self, unit: UnitRef) -> Option<VarId> {
        let depth = unit.level.depth();
        (depth < 5 && unit.index < self.counts[depth]).then(|| VarId(self.offsets[depth] + unit.index))
    }

    pub fn unit(&self, var: VarId) -> UnitRef {
        let depth = (0..5)
            .rev()
            .find(|&d| var.0 >= self.offsets[d] && self.counts[d] > 0)
            .unwrap_or(0);
        UnitRef::new(Level::VARIABLE_LEVELS[depth], var.0 - self.offsets[depth])
    }

    pub fn vars_at(&self, level: Level) -> Range<usize> {
        let depth = level.depth().min(4);
        self.offsets[depth]..self.offsets[depth] + self.counts[depth]
    }

    pub fn disk_var(&self, disk: usize) -> VarId {
        VarId(self.offsets[Level::Disk.depth()] + disk)
    }

    /// Disk index of a disk variable.
    pub fn disk_of(&self, var: VarId) -> Option<usize> {
        let disks = self.vars_at(Level::Disk);
        disks.contains(&var.0).then(|| var.0 - disks.start)
    }
}

/// Cooperative cancellation shared between the caller and a running attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parameters of one constrained-search attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptParams {
    pub iteration: usize,
    pub target: usize,
    pub disjoint_level: Level,
    pub overlap_tolerance: usize,
    /// Disks searched before all others, in order.
    pub frozen: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Initializing,
    Propagating,
    Branching,
    Solved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Initial propagation already failed; no branching happened.
    Root,
    /// The search tree was fully explored.
    Exhausted,
    /// The failure limit was hit before a solution was found.
    LimitReached,
}

/// A complete assignment: the committed partitions of every disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub objective: usize,
    pub disk_sets: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Solved(Solution),
    Failed {
        cause: FailureCause,
        last_contradiction: Option<Contradiction>,
    },
    Cancelled,
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Solved(_) => "solved",
            AttemptOutcome::Failed {
                cause: FailureCause::Root,
                ..
            } => "failed_at_root",
            AttemptOutcome::Failed {
                cause: FailureCause::Exhausted,
                ..
            } => "exhausted",
            AttemptOutcome::Failed {
                cause: FailureCause::LimitReached,
                ..
            } => "limit_reached",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

/// Counters of one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub decisions: u64,
    pub failures: u64,
    pub propagations: u64,
    pub max_depth: usize,
}

/// Everything an attempt hands back to the escalation loop.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,
    /// Disks the seed step left unsatisfied; they lead the branching order of later attempts.
    pub frozen: Vec<usize>,
    pub stats: SearchStats,
    pub phase: AttemptPhase,
}
