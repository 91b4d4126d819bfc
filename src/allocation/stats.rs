use super::snapshot::Allocation;
use crate::topology::{Level, Zone};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A disk holding fewer partitions than it has locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskFill {
    pub disk: String,
    pub used: usize,
    pub capacity: usize,
}

/// Quality summary of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub zone_capacity: usize,
    pub assigned: usize,
    /// Host count → number of partitions with that many hosts.
    pub replica_histogram: BTreeMap<usize, usize>,
    /// External ids with fewer hosts than the replication factor (including none).
    pub unsatisfied_partitions: Vec<u32>,
    pub over_replicated_partitions: Vec<u32>,
    pub unsatisfied_disks: Vec<DiskFill>,
    /// Level → sum over its units of the distinct partitions below each unit.
    pub cardinality: BTreeMap<Level, usize>,
    /// Shared-partition count → number of disk pairs sharing exactly that many.
    pub overlap_load: BTreeMap<usize, usize>,
}

impl AllocationStats {
    pub fn compute(zone: &Zone, allocation: &Allocation, replication_factor: usize) -> Self {
        let universe = allocation.universe();
        let hosts = allocation.partition_hosts(zone);

        let mut replica_histogram = BTreeMap::new();
        let mut unsatisfied_partitions = Vec::new();
        let mut over_replicated_partitions = Vec::new();
        let mut pair_shares: HashMap<(usize, usize), usize> = HashMap::new();

        for (p, disks) in hosts.iter().enumerate() {
            *replica_histogram.entry(disks.len()).or_insert(0) += 1;
            if disks.len() < replication_factor {
                unsatisfied_partitions.push(universe.to_external(p));
            } else if disks.len() > replication_factor {
                over_replicated_partitions.push(universe.to_external(p));
            }
            for (i, &a) in disks.iter().enumerate() {
                for &b in &disks[i + 1..] {
                    *pair_shares.entry((a.min(b), a.max(b))).or_insert(0) += 1;
                }
            }
        }

        let mut overlap_load = BTreeMap::new();
        for shared in pair_shares.into_values() {
            *overlap_load.entry(shared).or_insert(0) += 1;
        }

        let unsatisfied_disks = allocation
            .disk_partitions(zone)
            .iter()
            .zip(zone.disks())
            .filter(|(parts, disk)| parts.len() < disk.capacity)
            .map(|(parts, disk)| DiskFill {
                disk: disk.name.clone(),
                used: parts.len(),
                capacity: disk.capacity,
            })
            .collect();

        let cardinality = Level::VARIABLE_LEVELS
            .iter()
            .map(|&level| {
                let sum = allocation
                    .unit_partitions(zone, level)
                    .iter()
                    .map(|set| set.len())
                    .sum();
                (level, sum)
            })
            .collect();

        Self {
            zone_capacity: zone.capacity(),
            assigned: allocation.assigned(),
            replica_histogram,
            unsatisfied_partitions,
            over_replicated_partitions,
            unsatisfied_disks,
            cardinality,
            overlap_load,
        }
    }

    /// Largest number of partitions any two disks share.
    pub fn max_overlap(&self) -> usize {
        self.overlap_load.keys().next_back().copied().unwrap_or(0)
    }

    pub fn log(&self) {
        tracing::info!(
            "Assigned {}/{} locations; replica histogram {:?}",
            self.assigned,
            self.zone_capacity,
            self.replica_histogram
        );
        tracing::info!(
            "Unsatisfied partitions: {}, over-replicated: {}, unsatisfied disks: {}",
            self.unsatisfied_partitions.len(),
            self.over_replicated_partitions.len(),
            self.unsatisfied_disks.len()
        );
        for (level, sum) in &self.cardinality {
            tracing::info!("Cardinality at {}: {}", level, sum);
        }
        tracing::info!(
            "Disk pair overlap load {:?} (max {})",
            self.overlap_load,
            self.max_overlap()
        );
        for fill in &self.unsatisfied_disks {
            tracing::debug!("{} holds {}/{}", fill.disk, fill.used, fill.capacity);
        }
    }
}
