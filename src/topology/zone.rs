use super::loader::TopologySpec;
use super::types::{AllocationUnit, Level, UnitRef};
use std::collections::HashMap;
use std::ops::Range;

/// The built failure-domain tree of one zone.
///
/// Units are stored per level in creation order; a unit's `global_index` is its position in
/// that level's vector.
#[derive(Debug, Clone)]
pub struct Zone {
    name: String,
    levels: [Vec<AllocationUnit>; 6],
    disk_index: HashMap<String, usize>,
}

struct ZoneBuilder {
    levels: [Vec<AllocationUnit>; 6],
}

impl ZoneBuilder {
    fn open(&mut self, level: Level, name: String, local_index: usize, parent: Option<usize>) -> usize {
        let global_index = self.levels[level.depth()].len();
        if let (Some(parent_level), Some(parent)) = (level.parent(), parent) {
            self.levels[parent_level.depth()][parent].children.push(global_index);
        }

        let disks_start = match (level, parent) {
            (Level::Location, Some(disk)) => disk,
            _ => self.levels[Level::Disk.depth()].len(),
        };
        let locations_start = self.levels[Level::Location.depth()].len();

        self.levels[level.depth()].push(AllocationUnit {
            name,
            level,
            local_index,
            global_index,
            parent,
            children: Vec::new(),
            capacity: 0,
            disks: disks_start..disks_start,
            locations: locations_start..locations_start,
        });
        global_index
    }

    fn close(&mut self, level: Level, global_index: usize) {
        let disks_end = self.levels[Level::Disk.depth()].len();
        let locations_end = self.levels[Level::Location.depth()].len();
        let unit = &mut self.levels[level.depth()][global_index];
        unit.disks.end = if level == Level::Location {
            unit.disks.start + 1
        } else {
            disks_end
        };
        unit.locations.end = locations_end;
        unit.capacity = unit.locations.len();
    }
}

impl Zone {
    /// Builds the tree depth-first from a (possibly scaled) topology description.
    ///
    /// Disks are named `host[k]` with `k` starting at 1, locations `host[k][j]`.
    pub fn build(name: &str, spec: &TopologySpec) -> Zone {
        let mut builder = ZoneBuilder {
            levels: Default::default(),
        };

        let zone = builder.open(Level::Zone, name.to_string(), 0, None);
        for (ri, rack) in spec.racks.iter().enumerate() {
            let r = builder.open(Level::Rack, rack.name.clone(), ri, Some(zone));
            for (ci, chassis) in rack.chassis.iter().enumerate() {
                let c = builder.open(Level::Chassis, chassis.name.clone(), ci, Some(r));
                for (hi, host) in chassis.hosts.iter().enumerate() {
                    let h = builder.open(Level::Host, host.name.clone(), hi, Some(c));
                    for (k, &capacity) in host.disks.iter().enumerate() {
                        let disk_name = format!("{}[{}]", host.name, k + 1);
                        let d = builder.open(Level::Disk, disk_name.clone(), k, Some(h));
                        for j in 0..capacity {
                            let name = format!("{}[{}]", disk_name, j + 1);
                            let l = builder.open(Level::Location, name, j, Some(d));
                            builder.close(Level::Location, l);
                        }
                        builder.close(Level::Disk, d);
                    }
                    builder.close(Level::Host, h);
                }
                builder.close(Level::Chassis, c);
            }
            builder.close(Level::Rack, r);
        }
        builder.close(Level::Zone, zone);

        let disk_index = builder.levels[Level::Disk.depth()]
            .iter()
            .map(|disk| (disk.name.clone(), disk.global_index))
            .collect();

        Zone {
            name: name.to_string(),
            levels: builder.levels,
            disk_index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &AllocationUnit {
        &self.levels[Level::Zone.depth()][0]
    }

    /// Total number of locations in the zone.
    pub fn capacity(&self) -> usize {
        self.root().capacity
    }

    pub fn units(&self, level: Level) -> &[AllocationUnit] {
        &self.levels[level.depth()]
    }

    pub fn count(&self, level: Level) -> usize {
        self.levels[level.depth()].len()
    }

    pub fn unit(&self, unit: UnitRef) -> &AllocationUnit {
        &self.levels[unit.level.depth()][unit.index]
    }

    pub fn disks(&self) -> &[AllocationUnit] {
        self.units(Level::Disk)
    }

    pub fn disk(&self, index: usize) -> &AllocationUnit {
        &self.levels[Level::Disk.depth()][index]
    }

    pub fn disk_by_name(&self, name: &str) -> Option<usize> {
        self.disk_index.get(name).copied()
    }

    pub fn parent(&self, unit: UnitRef) -> Option<UnitRef> {
        let parent_level = unit.level.parent()?;
        self.unit(unit)
            .parent
            .map(|index| UnitRef::new(parent_level, index))
    }

    /// Walks up from `unit` to its ancestor at `level`. Returns the unit itself when the
    /// levels match, `None` when `level` is below the unit.
    pub fn ancestor(&self, unit: UnitRef, level: Level) -> Option<UnitRef> {
        let mut current = unit;
        while current.level > level {
            current = self.parent(current)?;
        }
        (current.level == level).then_some(current)
    }

    /// Disks that share the ancestor at `level` with `disk`.
    ///
    /// Two disks in the same group may not both host a partition while `level` is the active
    /// disjoint level.
    pub fn disjoint_group(&self, disk: usize, level: Level) -> Range<usize> {
        let level = level.min(Level::Disk);
        match self.ancestor(UnitRef::new(Level::Disk, disk), level) {
            Some(ancestor) => self.unit(ancestor).disks.clone(),
            None => disk..disk + 1,
        }
    }

    pub fn same_group(&self, a: usize, b: usize, level: Level) -> bool {
        self.disjoint_group(a, level).contains(&b)
    }
}
