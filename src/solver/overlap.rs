use super::domain::DomainStore;
use super::error::{Contradiction, ContradictionReason};
use super::types::VarLayout;
use std::collections::BTreeMap;

/// Bounds the number of partitions any two disks share and caps replicas per partition.
///
/// Keeps, for every partition, the disks currently committed to it, and for every disk the
/// shared-partition count with each disk it overlaps. This bookkeeping is trailed in step with
/// the domain store: `push_level`, `pop_level` and `merge_level` must mirror the store's calls.
#[derive(Debug, Clone)]
pub struct OverlapPropagator {
    replication_factor: usize,
    tolerance: usize,
    layout: VarLayout,
    hosts: Vec<Vec<usize>>,
    neighbours: Vec<BTreeMap<usize, usize>>,
    applied: Vec<(usize, usize)>,
    marks: Vec<usize>,
    fulfilled: usize,
}

impl OverlapPropagator {
    pub fn new(layout: VarLayout, disk_count: usize, universe: usize, replication_factor: usize, tolerance: usize) -> Self {
        Self {
            replication_factor,
            tolerance,
            layout,
            hosts: vec![Vec::new(); universe],
            neighbours: vec![BTreeMap::new(); disk_count],
            applied: Vec::new(),
            marks: Vec::new(),
            fulfilled: 0,
        }
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    pub fn hosts(&self, partition: usize) -> &[usize] {
        &self.hosts[partition]
    }

    pub fn shared(&self, a: usize, b: usize) -> usize {
        self.neighbours[a].get(&b).copied().unwrap_or(0)
    }

    /// Partitions that reached the replication factor.
    pub fn fulfilled(&self) -> usize {
        self.fulfilled
    }

    /// `disk` committed `partition`.
    pub fn on_forced(&mut self, store: &mut DomainStore, disk: usize, partition: usize) -> Result<(), Contradiction> {
        if self.hosts[partition].contains(&disk) {
            return Ok(());
        }
        let var = self.layout.disk_var(disk);

        let hosts = self.hosts[partition].len();
        if hosts >= self.replication_factor {
            return Err(Contradiction::on(
                var,
                ContradictionReason::ReplicationExceeded { value: partition, hosts },
            ));
        }
        for &other in &self.hosts[partition] {
            let shared = self.shared(disk, other) + 1;
            if shared > self.tolerance {
                return Err(Contradiction::on(
                    var,
                    ContradictionReason::OverlapExceeded {
                        other,
                        shared,
                        tolerance: self.tolerance,
                    },
                ));
            }
        }

        let co_hosts = self.hosts[partition].clone();
        for &other in &co_hosts {
            *self.neighbours[disk].entry(other).or_insert(0) += 1;
            *self.neighbours[other].entry(disk).or_insert(0) += 1;
        }
        self.hosts[partition].push(disk);
        self.applied.push((disk, partition));

        // Pairs that just reached the tolerance may not share anything new
        for &other in &co_hosts {
            if self.shared(disk, other) == self.tolerance {
                self.separate(store, disk, other)?;
            }
        }

        // Saturated neighbours of `disk` may not take `partition`
        if self.tolerance == 0 {
            self.exclude_others(store, partition)?;
        } else {
            let saturated: Vec<usize> = self.neighbours[disk]
                .iter()
                .filter(|&(n, &shared)| shared >= self.tolerance && !self.hosts[partition].contains(n))
                .map(|(&n, _)| n)
                .collect();
            for other in saturated {
                store.remove(self.layout.disk_var(other), partition)?;
            }
        }

        if self.hosts[partition].len() == self.replication_factor {
            self.fulfilled += 1;
            self.exclude_others(store, partition)?;
        }
        Ok(())
    }

    /// Removes from each disk of a saturated pair the committed partitions of the other.
    fn separate(&self, store: &mut DomainStore, a: usize, b: usize) -> Result<(), Contradiction> {
        let (va, vb) = (self.layout.disk_var(a), self.layout.disk_var(b));
        let only_b: Vec<usize> = store.committed(vb).difference(store.committed(va)).collect();
        let only_a: Vec<usize> = store.committed(va).difference(store.committed(vb)).collect();
        for p in only_b {
            store.remove(va, p)?;
        }
        for p in only_a {
            store.remove(vb, p)?;
        }
        Ok(())
    }

    /// Removes `partition` from every disk that does not host it.
    fn exclude_others(&self, store: &mut DomainStore, partition: usize) -> Result<(), Contradiction> {
        for disk in 0..self.neighbours.len() {
            if !self.hosts[partition].contains(&disk) {
                store.remove(self.layout.disk_var(disk), partition)?;
            }
        }
        Ok(())
    }

    pub fn push_level(&mut self) {
        self.marks.push(self.applied.len());
    }

    /// Retracts every host recorded since the last `push_level`.
    pub fn pop_level(&mut self) {
        let mark = self.marks.pop().unwrap_or(0);
        while self.applied.len() > mark {
            let Some((disk, partition)) = self.applied.pop() else {
                break;
            };
            self.retract(disk, partition);
        }
    }

    pub fn merge_level(&mut self) {
        self.marks.pop();
    }

    fn retract(&mut self, disk: usize, partition: usize) {
        if self.hosts[partition].len() == self.replication_factor {
            self.fulfilled -= 1;
        }
        self.hosts[partition].retain(|&d| d != disk);
        for &other in &self.hosts[partition] {
            for (a, b) in [(disk, other), (other, disk)] {
                if let Some(shared) = self.neighbours[a].get_mut(&b) {
                    *shared -= 1;
                    if *shared == 0 {
                        self.neighbours[a].remove(&b);
                    }
                }
            }
        }
    }
}
