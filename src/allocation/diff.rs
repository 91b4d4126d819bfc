use super::snapshot::Allocation;
use crate::topology::Zone;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Partitions (external ids, ascending) touching one disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskChange {
    pub disk: String,
    pub partitions: Vec<u32>,
}

/// Movement between two snapshots of the same zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationDiff {
    /// Disks that were empty before and hold partitions now.
    pub added: Vec<DiskChange>,
    /// Disks that held partitions before and are empty now.
    pub removed: Vec<DiskChange>,
    pub moved_out: Vec<DiskChange>,
    pub moved_in: Vec<DiskChange>,
}

impl AllocationDiff {
    pub fn between(zone: &Zone, previous: &Allocation, next: &Allocation) -> Self {
        let before = external_sets(zone, previous);
        let after = external_sets(zone, next);
        let mut diff = AllocationDiff::default();

        for (disk, (old, new)) in before.iter().zip(&after).enumerate() {
            let name = &zone.disk(disk).name;
            let change = |partitions: Vec<u32>| DiskChange {
                disk: name.clone(),
                partitions,
            };

            match (old.is_empty(), new.is_empty()) {
                (true, true) => {}
                (true, false) => diff.added.push(change(new.iter().copied().collect())),
                (false, true) => diff.removed.push(change(old.iter().copied().collect())),
                (false, false) => {
                    let out: Vec<u32> = old.difference(new).copied().collect();
                    let inn: Vec<u32> = new.difference(old).copied().collect();
                    if !out.is_empty() {
                        diff.moved_out.push(change(out));
                    }
                    if !inn.is_empty() {
                        diff.moved_in.push(change(inn));
                    }
                }
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved_in.is_empty() && self.moved_out.is_empty()
    }

    /// Replicas that landed on a disk which did not hold them before.
    pub fn moved_replicas(&self) -> usize {
        self.added
            .iter()
            .chain(&self.moved_in)
            .map(|c| c.partitions.len())
            .sum()
    }

    pub fn log(&self) {
        if self.is_empty() {
            tracing::info!("No partition movement");
            return;
        }
        for line in self.to_string().lines() {
            tracing::info!("{}", line);
        }
    }
}

impl fmt::Display for AllocationDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Add", &self.added),
            ("Del", &self.removed),
            ("Mv out", &self.moved_out),
            ("Mv in", &self.moved_in),
        ];
        for (label, changes) in sections {
            for change in changes {
                writeln!(f, "{} {} : {}", label, change.disk, format_ranges(&change.partitions))?;
            }
        }
        Ok(())
    }
}

fn external_sets(zone: &Zone, allocation: &Allocation) -> Vec<BTreeSet<u32>> {
    let universe = allocation.universe();
    allocation
        .disk_partitions(zone)
        .into_iter()
        .map(|ps| ps.into_iter().map(|p| universe.to_external(p)).collect())
        .collect()
}

/// Compact range notation: `[0, 1, 2, 3, 7, 9, 10]` → `"0-3, 7, 9-10"`.
pub fn format_ranges(ids: &[u32]) -> String {
    let sorted: BTreeSet<u32> = ids.iter().copied().collect();
    let mut parts = Vec::new();
    let mut run: Option<(u32, u32)> = None;

    for id in sorted {
        run = match run {
            Some((start, end)) if end + 1 == id => Some((start, id)),
            Some(previous) => {
                parts.push(previous);
                Some((id, id))
            }
            None => Some((id, id)),
        };
    }
    parts.extend(run);

    parts
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
