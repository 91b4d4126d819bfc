use super::bitset::PartitionSet;
use super::error::{Contradiction, ContradictionReason};
use super::types::{DomainEvent, VarId};
use std::collections::VecDeque;

/// Bounds of one set variable: `committed ⊆ value ⊆ possible`, `|value| ≤ capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDomain {
    committed: PartitionSet,
    possible: PartitionSet,
    capacity: usize,
}

impl SetDomain {
    pub fn committed(&self) -> &PartitionSet {
        &self.committed
    }

    pub fn possible(&self) -> &PartitionSet {
        &self.possible
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.committed.len() >= self.capacity
    }

    /// Lower and upper bound coincide.
    pub fn is_instantiated(&self) -> bool {
        self.committed.len() == self.possible.len()
    }

    /// Values still open for a decision.
    pub fn undecided(&self) -> impl Iterator<Item = usize> + '_ {
        self.possible.difference(&self.committed)
    }
}

#[derive(Debug, Clone, Copy)]
enum TrailEntry {
    Forced { var: VarId, value: usize },
    Removed { var: VarId, value: usize },
}

/// Owns every variable's bounds, the undo trail and the pending event queue.
///
/// Each effective change is trailed and queued exactly once; no-op requests neither trail nor
/// notify. Choice points are trail marks: `pop_level` undoes everything since the matching
/// `push_level`, `merge_level` keeps the changes and drops the mark.
#[derive(Debug, Clone)]
pub struct DomainStore {
    domains: Vec<SetDomain>,
    trail: Vec<TrailEntry>,
    marks: Vec<usize>,
    events: VecDeque<DomainEvent>,
}

impl DomainStore {
    /// One variable per capacity, all starting with `∅ ⊆ value ⊆ {0..universe}`.
    pub fn new(capacities: &[usize], universe: usize) -> Self {
        let domains = capacities
            .iter()
            .map(|&capacity| SetDomain {
                committed: PartitionSet::empty(universe),
                possible: PartitionSet::full(universe),
                capacity,
            })
            .collect();
        Self {
            domains,
            trail: Vec::new(),
            marks: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domain(&self, var: VarId) -> &SetDomain {
        &self.domains[var.0]
    }

    pub fn committed(&self, var: VarId) -> &PartitionSet {
        &self.domains[var.0].committed
    }

    pub fn possible(&self, var: VarId) -> &PartitionSet {
        &self.domains[var.0].possible
    }

    pub fn is_committed(&self, var: VarId, value: usize) -> bool {
        self.domains[var.0].committed.contains(value)
    }

    pub fn is_possible(&self, var: VarId, value: usize) -> bool {
        self.domains[var.0].possible.contains(value)
    }

    /// Adds `value` to the lower bound. Returns whether anything changed.
    pub fn force(&mut self, var: VarId, value: usize) -> Result<bool, Contradiction> {
        let domain = &mut self.domains[var.0];
        if domain.committed.contains(value) {
            return Ok(false);
        }
        if !domain.possible.contains(value) {
            return Err(Contradiction::on(var, ContradictionReason::NotPossible { value }));
        }
        if domain.committed.len() >= domain.capacity {
            return Err(Contradiction::on(
                var,
                ContradictionReason::CapacityExceeded {
                    value,
                    capacity: domain.capacity,
                },
            ));
        }

        domain.committed.insert(value);
        self.trail.push(TrailEntry::Forced { var, value });
        self.events.push_back(DomainEvent::Forced { var, value });
        Ok(true)
    }

    /// Drops `value` from the upper bound. Returns whether anything changed.
    pub fn remove(&mut self, var: VarId, value: usize) -> Result<bool, Contradiction> {
        let domain = &mut self.domains[var.0];
        if !domain.possible.contains(value) {
            return Ok(false);
        }
        if domain.committed.contains(value) {
            return Err(Contradiction::on(var, ContradictionReason::AlreadyCommitted { value }));
        }

        domain.possible.remove(value);
        self.trail.push(TrailEntry::Removed { var, value });
        self.events.push_back(DomainEvent::Removed { var, value });
        Ok(true)
    }

    pub fn next_event(&mut self) -> Option<DomainEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn push_level(&mut self) {
        self.marks.push(self.trail.len());
    }

    /// Undoes every change since the last `push_level`. Pending events are discarded.
    /// Returns the number of undone changes.
    pub fn pop_level(&mut self) -> usize {
        let mark = self.marks.pop().unwrap_or(0);
        let undone = self.trail.len().saturating_sub(mark);
        while self.trail.len() > mark {
            match self.trail.pop() {
                Some(TrailEntry::Forced { var, value }) => {
                    self.domains[var.0].committed.remove(value);
                }
                Some(TrailEntry::Removed { var, value }) => {
                    self.domains[var.0].possible.insert(value);
                }
                None => break,
            }
        }
        self.events.clear();
        undone
    }

    /// Folds the last level into its parent.
    pub fn merge_level(&mut self) {
        self.marks.pop();
    }

    /// Number of open levels.
    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}
