use super::domain::DomainStore;
use super::error::{Contradiction, ContradictionReason};
use super::types::{VarId, VarLayout};
use crate::topology::{Level, UnitRef, Zone};

/// Links every variable to its parent and children.
///
/// Per parent `U` with children `C1..Ck`:
/// - `value(U)` equals the union of the children's values.
/// - Below the disjoint level the children additionally partition `value(U)`.
/// - `|value(U)| ≤ capacity(U)`; a full unit keeps only its committed values possible.
#[derive(Debug, Clone)]
pub struct HierarchyPropagator {
    parent: Vec<Option<VarId>>,
    children: Vec<Vec<VarId>>,
    /// Whether the children of a variable must be pairwise disjoint.
    disjoint_children: Vec<bool>,
}

impl HierarchyPropagator {
    /// Children of units at `disjoint_level` and deeper are pairwise disjoint.
    pub fn new(zone: &Zone, layout: &VarLayout, disjoint_level: Level) -> Self {
        let mut parent = vec![None; layout.len()];
        let mut children = vec![Vec::new(); layout.len()];
        let mut disjoint_children = vec![false; layout.len()];

        for level in Level::VARIABLE_LEVELS {
            for unit in zone.units(level) {
                let Some(var) = layout.var(unit.unit_ref()) else {
                    continue;
                };
                parent[var.0] = zone
                    .parent(unit.unit_ref())
                    .and_then(|p| layout.var(p));
                if let Some(child_level) = level.child()
                    && child_level != Level::Location
                {
                    children[var.0] = unit
                        .children
                        .iter()
                        .filter_map(|&c| layout.var(UnitRef::new(child_level, c)))
                        .collect();
                }
                disjoint_children[var.0] = level >= disjoint_level;
            }
        }

        Self {
            parent,
            children,
            disjoint_children,
        }
    }

    pub fn on_forced(&self, store: &mut DomainStore, var: VarId, value: usize) -> Result<(), Contradiction> {
        let domain = store.domain(var);
        if domain.is_full() && !domain.is_instantiated() {
            let surplus: Vec<usize> = domain.undecided().collect();
            for extra in surplus {
                store.remove(var, extra)?;
            }
        }

        if let Some(parent) = self.parent[var.0] {
            store.force(parent, value)?;
            if self.disjoint_children[parent.0] {
                for &sibling in &self.children[parent.0] {
                    if sibling != var {
                        store.remove(sibling, value)?;
                    }
                }
            }
        }

        self.support(store, var, value)
    }

    pub fn on_removed(&self, store: &mut DomainStore, var: VarId, value: usize) -> Result<(), Contradiction> {
        for &child in &self.children[var.0] {
            store.remove(child, value)?;
        }

        if let Some(parent) = self.parent[var.0] {
            let mut holders = self.children[parent.0]
                .iter()
                .copied()
                .filter(|&c| store.is_possible(c, value));
            match (holders.next(), holders.next()) {
                (None, _) => {
                    store.remove(parent, value)?;
                }
                (Some(only), None) => {
                    if store.is_committed(parent, value) {
                        store.force(only, value)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// A committed value of `var` must be held, or still holdable, by one of its children.
    /// A sole remaining candidate is forced.
    fn support(&self, store: &mut DomainStore, var: VarId, value: usize) -> Result<(), Contradiction> {
        let children = &self.children[var.0];
        if children.is_empty() || children.iter().any(|&c| store.is_committed(c, value)) {
            return Ok(());
        }

        let mut candidates = children.iter().copied().filter(|&c| store.is_possible(c, value));
        match (candidates.next(), candidates.next()) {
            (None, _) => Err(Contradiction::on(var, ContradictionReason::NoSupport { value })),
            (Some(only), None) => store.force(only, value).map(|_| ()),
            _ => Ok(()),
        }
    }
}
