use super::universe::PartitionUniverse;
use crate::topology::{Level, Zone};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

/// A placement of partitions onto locations, in local partition numbering.
///
/// Produced from a prior allocation file or rolled up from a solved attempt. At most one
/// partition per location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    universe: PartitionUniverse,
    /// Indexed by global location index.
    locations: Vec<Option<usize>>,
}

/// What loading a prior allocation had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Locations left without a partition.
    pub unallocated: usize,
    /// Per disk name: entries outside the universe, duplicated, or beyond capacity.
    pub over_allocated: Vec<(String, Vec<u32>)>,
    /// Keys of the file that name no disk of the zone.
    pub unknown_disks: Vec<String>,
}

impl LoadReport {
    pub fn log(&self) {
        tracing::info!("Unallocated locations: {}", self.unallocated);
        for (disk, ids) in &self.over_allocated {
            tracing::warn!("Over-allocated partitions on {}: {:?}", disk, ids);
        }
        for disk in &self.unknown_disks {
            tracing::warn!("Allocation names unknown disk {}; ignoring it", disk);
        }
    }
}

impl Allocation {
    pub fn empty(zone: &Zone, universe: PartitionUniverse) -> Self {
        Self {
            universe,
            locations: vec![None; zone.count(Level::Location)],
        }
    }

    /// Builds an allocation from per-disk lists of external ids (keyed by disk name).
    ///
    /// The universe is anchored at the smallest id found on a known disk.
    pub fn from_disk_lists(
        zone: &Zone,
        replication_factor: usize,
        lists: &[(String, Vec<u32>)],
    ) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let mut known = Vec::new();
        for (name, ids) in lists {
            match zone.disk_by_name(name) {
                Some(disk) => known.push((disk, name, ids)),
                None => report.unknown_disks.push(name.clone()),
            }
        }

        let smallest = known.iter().flat_map(|(_, _, ids)| ids.iter().copied()).min();
        let universe = PartitionUniverse::new(zone.capacity(), replication_factor, smallest);
        let mut allocation = Self::empty(zone, universe);

        for (disk, name, ids) in known {
            let unit = zone.disk(disk);
            let mut seen = BTreeSet::new();
            let mut rejected = Vec::new();
            let mut next = unit.locations.start;

            for &id in ids {
                match universe.to_local(id) {
                    Some(local) if next < unit.locations.end && seen.insert(local) => {
                        allocation.locations[next] = Some(local);
                        next += 1;
                    }
                    _ => rejected.push(id),
                }
            }
            if !rejected.is_empty() {
                report.over_allocated.push((name.clone(), rejected));
            }
        }

        report.unallocated = allocation.locations.iter().filter(|p| p.is_none()).count();
        (allocation, report)
    }

    /// Parses the JSON file form: `{"host[k]": [id, ...], ...}`.
    pub fn from_json_str(zone: &Zone, replication_factor: usize, content: &str) -> Result<(Self, LoadReport)> {
        let object: Map<String, Value> = serde_json::from_str(content)?;
        let lists = object
            .into_iter()
            .map(|(disk, ids)| {
                let ids: Vec<u32> = serde_json::from_value(ids)
                    .map_err(|e| anyhow!("disk '{}' must map to a list of partition ids: {}", disk, e))?;
                Ok((disk, ids))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_disk_lists(zone, replication_factor, &lists))
    }

    pub fn load(path: &Path, zone: &Zone, replication_factor: usize) -> Result<(Self, LoadReport)> {
        tracing::info!("Reading allocation from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allocation file {}", path.display()))?;
        Self::from_json_str(zone, replication_factor, &content)
            .with_context(|| format!("Invalid allocation file {}", path.display()))
    }

    /// JSON file form with every disk of the zone, in declaration order.
    pub fn to_json_value(&self, zone: &Zone) -> Value {
        let mut object = Map::new();
        for (disk, partitions) in self.disk_partitions(zone).into_iter().enumerate() {
            let ids: Vec<u32> = partitions
                .into_iter()
                .map(|p| self.universe.to_external(p))
                .collect();
            object.insert(zone.disk(disk).name.clone(), Value::from(ids));
        }
        Value::Object(object)
    }

    pub fn save(&self, path: &Path, zone: &Zone) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_json_value(zone))?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write allocation file {}", path.display()))?;
        tracing::info!("Wrote allocation to {}", path.display());
        Ok(())
    }

    /// Rolls a solved assignment (one partition set per disk) up onto locations.
    ///
    /// Partitions that stay on a disk keep the location they had in `previous`; freed
    /// locations take the newly placed partitions in ascending order.
    pub fn from_disk_sets(
        zone: &Zone,
        universe: PartitionUniverse,
        sets: &[Vec<usize>],
        previous: Option<&Allocation>,
    ) -> Self {
        let mut allocation = Self::empty(zone, universe);

        for (disk, set) in sets.iter().enumerate() {
            let locations = zone.disk(disk).locations.clone();
            let wanted: BTreeSet<usize> = set.iter().copied().collect();
            let mut placed = BTreeSet::new();

            if let Some(previous) = previous {
                for location in locations.clone() {
                    if let Some(p) = previous.locations.get(location).copied().flatten()
                        && wanted.contains(&p)
                        && placed.insert(p)
                    {
                        allocation.locations[location] = Some(p);
                    }
                }
            }

            let mut incoming = wanted.difference(&placed).copied();
            for location in locations {
                if allocation.locations[location].is_none() {
                    allocation.locations[location] = incoming.next();
                }
            }
        }

        allocation
    }

    pub fn universe(&self) -> PartitionUniverse {
        self.universe
    }

    pub fn is_empty(&self) -> bool {
        self.locations.iter().all(Option::is_none)
    }

    pub fn assigned(&self) -> usize {
        self.locations.iter().filter(|p| p.is_some()).count()
    }

    pub fn partition_at(&self, location: usize) -> Option<usize> {
        self.locations.get(location).copied().flatten()
    }

    /// Partitions of every disk, in location order.
    pub fn disk_partitions(&self, zone: &Zone) -> Vec<Vec<usize>> {
        zone.disks()
            .iter()
            .map(|disk| disk.locations.clone().filter_map(|l| self.locations[l]).collect())
            .collect()
    }

    /// Hosting disks of every local partition, in disk order.
    pub fn partition_hosts(&self, zone: &Zone) -> Vec<Vec<usize>> {
        let mut hosts = vec![Vec::new(); self.universe.count()];
        for disk in zone.disks() {
            for location in disk.locations.clone() {
                if let Some(p) = self.locations[location] {
                    hosts[p].push(disk.global_index);
                }
            }
        }
        hosts
    }

    /// Distinct partitions held below every unit of `level`.
    pub fn unit_partitions(&self, zone: &Zone, level: Level) -> Vec<BTreeSet<usize>> {
        zone.units(level)
            .iter()
            .map(|unit| unit.locations.clone().filter_map(|l| self.locations[l]).collect())
            .collect()
    }
}
