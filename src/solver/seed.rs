//! Seed/repair of a prior placement before branching.
//!
//! Planning works on plain host maps and never touches the domain store; `apply` then forces
//! the planned assignments one by one, each inside its own level so a clashing assignment can
//! be rolled back and dropped on its own.

use super::engine::PropagationEngine;
use super::error::Contradiction;
use crate::allocation::Allocation;
use crate::topology::{Level, Zone};
use serde::Serialize;

/// Two disks of one disjoint group hosting the same partition. `removed` lost it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedConflict {
    pub partition: usize,
    pub kept: usize,
    pub removed: usize,
}

/// `d2` moved from `p2` to `p1`; `d1` took `p2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSwap {
    pub p1: usize,
    pub d1: usize,
    pub p2: usize,
    pub d2: usize,
    pub level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedPlan {
    /// Partitions to force, per disk, in prior location order.
    pub disk_partitions: Vec<Vec<usize>>,
    pub conflicts: Vec<SeedConflict>,
    /// Replicas beyond the replication factor that were dropped, as (disk, partition).
    pub trimmed: Vec<(usize, usize)>,
    pub swaps: Vec<SeedSwap>,
    /// Disks still below capacity after repair, in disk order.
    pub unsatisfied_disks: Vec<usize>,
    /// Partitions with at least one but fewer than the replication factor hosts.
    pub unsatisfied_replicas: usize,
    /// Swapping stopped because too many replicas were unsatisfied.
    pub gave_up: bool,
}

impl SeedPlan {
    pub fn repaired(&self) -> bool {
        !self.conflicts.is_empty() || !self.trimmed.is_empty()
    }

    /// The same plan with only the assignments of unsatisfied disks, so that satisfied disks
    /// stay open to search. `None` when that would not leave anything to force or would not
    /// free any disk.
    pub fn frozen_only(&self) -> Option<SeedPlan> {
        if self.repaired() || self.unsatisfied_disks.is_empty() {
            return None;
        }
        let mut plan = self.clone();
        let mut freed = false;
        for (disk, partitions) in plan.disk_partitions.iter_mut().enumerate() {
            if !self.unsatisfied_disks.contains(&disk) && !partitions.is_empty() {
                partitions.clear();
                freed = true;
            }
        }
        let forced = plan.disk_partitions.iter().any(|p| !p.is_empty());
        (freed && forced).then_some(plan)
    }
}

/// A prior assignment that clashed with the model and was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedAssignment {
    pub disk: usize,
    pub partition: usize,
    pub contradiction: Contradiction,
}

struct HostMaps {
    disk_parts: Vec<Vec<usize>>,
    part_hosts: Vec<Vec<usize>>,
}

impl HostMaps {
    fn remove(&mut self, disk: usize, partition: usize) {
        self.disk_parts[disk].retain(|&p| p != partition);
        self.part_hosts[partition].retain(|&d| d != disk);
    }

    fn add(&mut self, disk: usize, partition: usize) {
        self.disk_parts[disk].push(partition);
        self.part_hosts[partition].push(disk);
    }

    /// Partitions hosted on any of `disks`.
    fn partitions_of(&self, disks: &[bool]) -> Vec<bool> {
        let mut out = vec![false; self.part_hosts.len()];
        for (disk, _) in disks.iter().enumerate().filter(|(_, in_set)| **in_set) {
            for &p in &self.disk_parts[disk] {
                out[p] = true;
            }
        }
        out
    }

    /// Disks hosting any of `partitions`.
    fn disks_of(&self, partitions: &[bool]) -> Vec<bool> {
        let mut out = vec![false; self.disk_parts.len()];
        for (p, _) in partitions.iter().enumerate().filter(|(_, in_set)| **in_set) {
            for &d in &self.part_hosts[p] {
                out[d] = true;
            }
        }
        out
    }
}

/// Plans the seed of one attempt from the latest snapshot.
pub struct SeedRepair<'z> {
    zone: &'z Zone,
    replication_factor: usize,
    disjoint_level: Level,
    overlap_tolerance: usize,
    cutoff: usize,
}

impl<'z> SeedRepair<'z> {
    pub fn new(
        zone: &'z Zone,
        replication_factor: usize,
        disjoint_level: Level,
        overlap_tolerance: usize,
        cutoff: usize,
    ) -> Self {
        Self {
            zone,
            replication_factor,
            disjoint_level,
            overlap_tolerance,
            cutoff,
        }
    }

    pub fn plan(&self, prior: &Allocation) -> SeedPlan {
        let mut maps = HostMaps {
            disk_parts: prior.disk_partitions(self.zone),
            part_hosts: prior.partition_hosts(self.zone),
        };
        let mut plan = SeedPlan::default();

        self.remove_conflicts(&mut maps, &mut plan);
        self.trim_over_replication(&mut maps, &mut plan);

        if plan.repaired() {
            tracing::info!(
                "Seed repaired {} disjoint conflicts and {} surplus replicas",
                plan.conflicts.len(),
                plan.trimmed.len()
            );
            plan.disk_partitions = maps.disk_parts;
            return plan;
        }

        let mut unsatisfied: Vec<usize> = self
            .zone
            .disks()
            .iter()
            .filter(|disk| maps.disk_parts[disk.global_index].len() < disk.capacity)
            .map(|disk| disk.global_index)
            .collect();

        if self.overlap_tolerance > 0 {
            self.swap_passes(&mut maps, &mut unsatisfied, &mut plan);
        }

        plan.unsatisfied_replicas = self.unsatisfied_replicas(&maps).len();
        plan.unsatisfied_disks = unsatisfied;
        plan.disk_partitions = maps.disk_parts;
        plan
    }

    fn remove_conflicts(&self, maps: &mut HostMaps, plan: &mut SeedPlan) {
        for disk in 0..maps.disk_parts.len() {
            let group = self.zone.disjoint_group(disk, self.disjoint_level);
            for partition in maps.disk_parts[disk].clone() {
                if !maps.part_hosts[partition].contains(&disk) {
                    continue;
                }
                let clashing: Vec<usize> = maps.part_hosts[partition]
                    .iter()
                    .copied()
                    .filter(|&other| other != disk && group.contains(&other))
                    .collect();
                for other in clashing {
                    tracing::debug!(
                        "{} overlaps with {} for partition {}",
                        self.zone.disk(disk).name,
                        self.zone.disk(other).name,
                        partition
                    );
                    maps.remove(other, partition);
                    plan.conflicts.push(SeedConflict {
                        partition,
                        kept: disk,
                        removed: other,
                    });
                }
            }
        }
    }

    fn trim_over_replication(&self, maps: &mut HostMaps, plan: &mut SeedPlan) {
        for partition in 0..maps.part_hosts.len() {
            let surplus: Vec<usize> = maps.part_hosts[partition]
                .iter()
                .copied()
                .skip(self.replication_factor)
                .collect();
            for disk in surplus {
                maps.remove(disk, partition);
                plan.trimmed.push((disk, partition));
            }
        }
    }

    fn unsatisfied_replicas(&self, maps: &HostMaps) -> Vec<usize> {
        maps.part_hosts
            .iter()
            .enumerate()
            .filter(|(_, hosts)| !hosts.is_empty() && hosts.len() < self.replication_factor)
            .map(|(p, _)| p)
            .collect()
    }

    fn swap_passes(&self, maps: &mut HostMaps, unsatisfied: &mut Vec<usize>, plan: &mut SeedPlan) {
        let mut level = Level::Rack;
        while level <= self.disjoint_level.min(Level::Disk) && !unsatisfied.is_empty() {
            let replicas = self.unsatisfied_replicas(maps);
            tracing::debug!("Seed pass at {}: {} unsatisfied replicas", level, replicas.len());
            if replicas.len() > self.cutoff {
                plan.gave_up = true;
                break;
            }

            for p1 in replicas {
                if maps.part_hosts[p1].len() >= self.replication_factor {
                    continue;
                }
                let Some((d1, p2, d2)) = self.find_swap(maps, unsatisfied, p1, level) else {
                    continue;
                };

                maps.remove(d2, p2);
                maps.add(d2, p1);
                maps.add(d1, p2);
                plan.swaps.push(SeedSwap { p1, d1, p2, d2, level });

                if maps.disk_parts[d1].len() >= self.zone.disk(d1).capacity {
                    unsatisfied.retain(|&d| d != d1);
                }
                if unsatisfied.is_empty() {
                    break;
                }
            }

            match level.child() {
                Some(next) => level = next,
                None => break,
            }
        }
    }

    /// First `(d1, p2, d2)` such that moving `d2` from `p2` to `p1` and giving `p2` to `d1`
    /// breaks neither the disjoint groups of `level` nor creates a second shared partition for
    /// any disk pair.
    fn find_swap(&self, maps: &HostMaps, unsatisfied: &[usize], p1: usize, level: Level) -> Option<(usize, usize, usize)> {
        let disk_count = maps.disk_parts.len();
        let p1_hosts = &maps.part_hosts[p1];

        let mut p1_n1 = vec![false; disk_count];
        for &d in p1_hosts {
            p1_n1[d] = true;
        }
        let p1_n3 = maps.disks_of(&maps.partitions_of(&p1_n1));

        for &d1 in unsatisfied {
            let mut d1_n1 = vec![false; disk_count];
            d1_n1[d1] = true;
            let d1_n3 = maps.partitions_of(&maps.disks_of(&maps.partitions_of(&d1_n1)));
            let d1_group = self.zone.disjoint_group(d1, level);

            for (p2, hosts) in maps.part_hosts.iter().enumerate() {
                if d1_n3[p2] || hosts.is_empty() {
                    continue;
                }
                for &d2 in hosts {
                    if p1_n3[d2] {
                        continue;
                    }
                    if hosts.iter().any(|&other| other != d2 && d1_group.contains(&other)) {
                        continue;
                    }
                    let d2_group = self.zone.disjoint_group(d2, level);
                    if p1_hosts.iter().any(|d| d2_group.contains(d)) {
                        continue;
                    }
                    return Some((d1, p2, d2));
                }
            }
        }
        None
    }
}

/// Forces a plan into the engine. Assignments that contradict are rolled back and returned.
pub fn apply(engine: &mut PropagationEngine, plan: &SeedPlan) -> Vec<DroppedAssignment> {
    let mut dropped = Vec::new();
    for (disk, partitions) in plan.disk_partitions.iter().enumerate() {
        for &partition in partitions {
            engine.push_level();
            match engine.force_disk(disk, partition) {
                Ok(()) => engine.merge_level(),
                Err(contradiction) => {
                    engine.pop_level();
                    dropped.push(DroppedAssignment {
                        disk,
                        partition,
                        contradiction,
                    });
                }
            }
        }
    }
    dropped
}
