use super::domain::DomainStore;
use super::error::{Contradiction, ContradictionReason};
use super::hierarchy::HierarchyPropagator;
use super::overlap::OverlapPropagator;
use super::types::{DomainEvent, VarId, VarLayout};
use crate::topology::{Level, UnitRef, Zone};
use std::ops::Range;

/// Static inputs of one model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelParams {
    pub universe: usize,
    pub replication_factor: usize,
    pub disjoint_level: Level,
    pub overlap_tolerance: usize,
    pub target: usize,
}

/// Upper bound on the objective at the active disjoint level.
#[derive(Debug, Clone)]
struct ObjectiveBound {
    vars: Vec<VarId>,
    disks: Vec<Range<usize>>,
    target: usize,
}

impl ObjectiveBound {
    fn value(&self, store: &DomainStore) -> usize {
        self.vars.iter().map(|&v| store.committed(v).len()).sum()
    }

    /// Per unit: `min(capacity, |possible|, Σ over its disks min(capacity_d, |possible_d|))`.
    fn bound(&self, store: &DomainStore, layout: &VarLayout) -> usize {
        self.vars
            .iter()
            .zip(&self.disks)
            .map(|(&var, disks)| {
                let domain = store.domain(var);
                let below: usize = disks
                    .clone()
                    .map(|d| {
                        let disk = store.domain(layout.disk_var(d));
                        disk.capacity().min(disk.possible().len())
                    })
                    .sum();
                domain.capacity().min(domain.possible().len()).min(below)
            })
            .sum()
    }
}

/// The constraint model of one attempt: variables, propagators and the fixed-point loop.
///
/// Every public mutation runs propagation to a fixed point before returning. On contradiction
/// the state is left as it was at the failure point; the caller restores it with `pop_level`.
#[derive(Debug, Clone)]
pub struct PropagationEngine {
    layout: VarLayout,
    store: DomainStore,
    hierarchy: HierarchyPropagator,
    overlap: OverlapPropagator,
    objective: ObjectiveBound,
    params: ModelParams,
    propagations: u64,
}

impl PropagationEngine {
    pub fn new(zone: &Zone, params: ModelParams) -> Self {
        let layout = VarLayout::new(zone);

        let capacities: Vec<usize> = Level::VARIABLE_LEVELS
            .iter()
            .flat_map(|&level| zone.units(level).iter().map(|u| u.capacity))
            .collect();
        let store = DomainStore::new(&capacities, params.universe);

        let active = params.disjoint_level.min(Level::Disk);
        let objective = ObjectiveBound {
            vars: layout.vars_at(active).map(VarId).collect(),
            disks: zone.units(active).iter().map(|u| u.disks.clone()).collect(),
            target: params.target,
        };

        Self {
            hierarchy: HierarchyPropagator::new(zone, &layout, params.disjoint_level),
            overlap: OverlapPropagator::new(
                layout.clone(),
                zone.count(Level::Disk),
                params.universe,
                params.replication_factor,
                params.overlap_tolerance,
            ),
            layout,
            store,
            objective,
            params,
            propagations: 0,
        }
    }

    /// Empties units without locations, then propagates.
    pub fn initialize(&mut self) -> Result<(), Contradiction> {
        for var in (0..self.store.len()).map(VarId) {
            if self.store.domain(var).capacity() == 0 {
                let values: Vec<usize> = self.store.possible(var).iter().collect();
                for value in values {
                    if let Err(err) = self.store.remove(var, value) {
                        self.store.clear_events();
                        return Err(err);
                    }
                }
            }
        }
        self.propagate()
    }

    /// Drains the event queue through the propagators, then checks the objective bound.
    pub fn propagate(&mut self) -> Result<(), Contradiction> {
        while let Some(event) = self.store.next_event() {
            self.propagations += 1;
            if let Err(err) = self.dispatch(event) {
                self.store.clear_events();
                return Err(err);
            }
        }

        let bound = self.objective_bound();
        if bound < self.objective.target {
            return Err(Contradiction::global(ContradictionReason::ObjectiveUnreachable {
                bound,
                target: self.objective.target,
            }));
        }
        Ok(())
    }

    fn dispatch(&mut self, event: DomainEvent) -> Result<(), Contradiction> {
        match event {
            DomainEvent::Forced { var, value } => {
                self.hierarchy.on_forced(&mut self.store, var, value)?;
                if let Some(disk) = self.layout.disk_of(var) {
                    self.overlap.on_forced(&mut self.store, disk, value)?;
                }
                Ok(())
            }
            DomainEvent::Removed { var, value } => self.hierarchy.on_removed(&mut self.store, var, value),
        }
    }

    /// Sets the objective target checked at the end of every propagation.
    pub fn set_target(&mut self, target: usize) {
        self.objective.target = target;
        self.params.target = target;
    }

    pub fn force(&mut self, var: VarId, value: usize) -> Result<(), Contradiction> {
        if let Err(err) = self.store.force(var, value) {
            self.store.clear_events();
            return Err(err);
        }
        self.propagate()
    }

    pub fn remove(&mut self, var: VarId, value: usize) -> Result<(), Contradiction> {
        if let Err(err) = self.store.remove(var, value) {
            self.store.clear_events();
            return Err(err);
        }
        self.propagate()
    }

    pub fn force_disk(&mut self, disk: usize, value: usize) -> Result<(), Contradiction> {
        self.force(self.layout.disk_var(disk), value)
    }

    pub fn remove_from_disk(&mut self, disk: usize, value: usize) -> Result<(), Contradiction> {
        self.remove(self.layout.disk_var(disk), value)
    }

    pub fn push_level(&mut self) {
        self.store.push_level();
        self.overlap.push_level();
    }

    pub fn pop_level(&mut self) {
        self.store.pop_level();
        self.overlap.pop_level();
    }

    pub fn merge_level(&mut self) {
        self.store.merge_level();
        self.overlap.merge_level();
    }

    pub fn depth(&self) -> usize {
        self.store.depth()
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    pub fn layout(&self) -> &VarLayout {
        &self.layout
    }

    pub fn overlap(&self) -> &OverlapPropagator {
        &self.overlap
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn propagations(&self) -> u64 {
        self.propagations
    }

    pub fn var_of(&self, unit: UnitRef) -> Option<VarId> {
        self.layout.var(unit)
    }

    pub fn disk_count(&self) -> usize {
        self.layout.vars_at(Level::Disk).len()
    }

    pub fn disk_instantiated(&self, disk: usize) -> bool {
        self.store.domain(self.layout.disk_var(disk)).is_instantiated()
    }

    /// Smallest partition the disk may still take but has not committed.
    pub fn next_value(&self, disk: usize) -> Option<usize> {
        self.store.domain(self.layout.disk_var(disk)).undecided().next()
    }

    /// Σ committed cardinalities at the active disjoint level.
    pub fn objective(&self) -> usize {
        self.objective.value(&self.store)
    }

    pub fn objective_bound(&self) -> usize {
        self.objective.bound(&self.store, &self.layout)
    }

    pub fn disk_sets(&self) -> Vec<Vec<usize>> {
        (0..self.disk_count())
            .map(|d| self.store.committed(self.layout.disk_var(d)).iter().collect())
            .collect()
    }
}
