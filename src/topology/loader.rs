use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Nested rack → chassis → host → disk-capacity description of a zone.
///
/// Declaration order is preserved everywhere; it drives global indexing and the branching order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub racks: Vec<RackSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackSpec {
    pub name: String,
    pub chassis: Vec<ChassisSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisSpec {
    pub name: String,
    pub hosts: Vec<HostSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub name: String,
    /// Location count of each disk, in order.
    pub disks: Vec<usize>,
}

impl TopologySpec {
    /// Reads a topology file. `.top` files use the line format, anything else is parsed as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file {}", path.display()))?;

        let spec = match path.extension().and_then(|ext| ext.to_str()) {
            Some("top") => Self::from_top_str(&content),
            _ => Self::from_json_str(&content),
        }
        .with_context(|| format!("Invalid topology file {}", path.display()))?;

        tracing::info!(
            "Loaded topology {}: {} racks, {} hosts, {} locations",
            path.display(),
            spec.racks.len(),
            spec.host_count(),
            spec.total_capacity()
        );
        Ok(spec)
    }

    /// Parses the nested JSON object form: `{rack: {chassis: {host: [capacity, ...]}}}`.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let racks = as_object(&value, "zone")?;

        let mut spec = TopologySpec::default();
        for (rack_name, chassis_value) in racks {
            let mut rack = RackSpec {
                name: rack_name.clone(),
                chassis: Vec::new(),
            };
            for (chassis_name, hosts_value) in as_object(chassis_value, rack_name)? {
                let mut chassis = ChassisSpec {
                    name: chassis_name.clone(),
                    hosts: Vec::new(),
                };
                for (host_name, disks_value) in as_object(hosts_value, chassis_name)? {
                    let disks = disks_value
                        .as_array()
                        .ok_or_else(|| anyhow!("host '{}' must map to a list of capacities", host_name))?
                        .iter()
                        .map(|capacity| {
                            capacity
                                .as_u64()
                                .map(|c| c as usize)
                                .ok_or_else(|| anyhow!("host '{}' has a non-integer capacity {}", host_name, capacity))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    chassis.hosts.push(HostSpec {
                        name: host_name.clone(),
                        disks,
                    });
                }
                rack.chassis.push(chassis);
            }
            spec.racks.push(rack);
        }
        Ok(spec)
    }

    /// Parses the line-oriented format.
    ///
    /// `# rack <R> chassis <C>` switches the current rack and chassis (initially `default-rack`
    /// and `default-chassis`). `host <name> <kind> <cap> <cap> ...` declares a host in the
    /// current chassis. Other lines are ignored. A repeated host keeps its first entry.
    pub fn from_top_str(content: &str) -> Result<Self> {
        let rack_line = Regex::new(r"# rack (.*) chassis (.*)")?;
        let host_line = Regex::new(r"host (\w*) \w* ([ \d]*)")?;

        let mut spec = TopologySpec::default();
        let mut rack = "default-rack".to_string();
        let mut chassis = "default-chassis".to_string();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = rack_line.captures(line) {
                rack = caps[1].trim().to_string();
                chassis = caps[2].trim().to_string();
                spec.chassis_mut(&rack, &chassis);
                continue;
            }

            if let Some(caps) = host_line.captures(line) {
                let host = caps[1].to_string();
                let disks = caps[2]
                    .split_whitespace()
                    .map(|token| {
                        token
                            .parse::<usize>()
                            .with_context(|| format!("host '{}' has an invalid capacity '{}'", host, token))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let target = spec.chassis_mut(&rack, &chassis);
                if target.hosts.iter().any(|h| h.name == host) {
                    tracing::warn!(
                        "Zone topology contains duplicate entries for host {}; keeping the first entry",
                        host
                    );
                    continue;
                }
                target.hosts.push(HostSpec { name: host, disks });
            }
        }

        if spec.racks.is_empty() {
            bail!("no rack, chassis or host lines found");
        }
        Ok(spec)
    }

    fn chassis_mut(&mut self, rack: &str, chassis: &str) -> &mut ChassisSpec {
        let rack_pos = match self.racks.iter().position(|r| r.name == rack) {
            Some(pos) => pos,
            None => {
                self.racks.push(RackSpec {
                    name: rack.to_string(),
                    chassis: Vec::new(),
                });
                self.racks.len() - 1
            }
        };
        let rack = &mut self.racks[rack_pos];
        let chassis_pos = match rack.chassis.iter().position(|c| c.name == chassis) {
            Some(pos) => pos,
            None => {
                rack.chassis.push(ChassisSpec {
                    name: chassis.to_string(),
                    hosts: Vec::new(),
                });
                rack.chassis.len() - 1
            }
        };
        &mut rack.chassis[chassis_pos]
    }

    /// Nested JSON form, the inverse of [`TopologySpec::from_json_str`].
    pub fn to_json_value(&self) -> Value {
        let mut racks = Map::new();
        for rack in &self.racks {
            let mut chassis_map = Map::new();
            for chassis in &rack.chassis {
                let mut hosts = Map::new();
                for host in &chassis.hosts {
                    hosts.insert(host.name.clone(), Value::from(host.disks.clone()));
                }
                chassis_map.insert(chassis.name.clone(), Value::Object(hosts));
            }
            racks.insert(rack.name.clone(), Value::Object(chassis_map));
        }
        Value::Object(racks)
    }

    pub fn host_count(&self) -> usize {
        self.racks
            .iter()
            .flat_map(|r| &r.chassis)
            .map(|c| c.hosts.len())
            .sum()
    }

    pub fn total_capacity(&self) -> usize {
        self.disk_capacities().sum()
    }

    fn disk_capacities(&self) -> impl Iterator<Item = usize> + '_ {
        self.racks
            .iter()
            .flat_map(|r| &r.chassis)
            .flat_map(|c| &c.hosts)
            .flat_map(|h| h.disks.iter().copied())
    }

    /// Scales every disk capacity by `fill_level`.
    ///
    /// The fractional remainder of each disk carries into the next one, so the total loses less
    /// than one location to rounding. The total is then trimmed from the last disks to a multiple
    /// of `replication_factor`.
    pub fn scaled(&self, fill_level: f64, replication_factor: usize) -> TopologySpec {
        let mut scaled = self.clone();
        let mut carry = 0.0;
        let mut total = 0;

        for capacity in scaled
            .racks
            .iter_mut()
            .flat_map(|r| r.chassis.iter_mut())
            .flat_map(|c| c.hosts.iter_mut())
            .flat_map(|h| h.disks.iter_mut())
        {
            let exact = *capacity as f64 * fill_level + carry;
            let used = exact.floor() as usize;
            carry = exact - used as f64;
            *capacity = used;
            total += used;
        }

        if replication_factor > 0 && total % replication_factor != 0 {
            let mut excess = total % replication_factor;
            tracing::info!(
                "Capacity {} is not divisible by {}; trimming {} from the last disks",
                total,
                replication_factor,
                excess
            );
            let disks = scaled
                .racks
                .iter_mut()
                .flat_map(|r| r.chassis.iter_mut())
                .flat_map(|c| c.hosts.iter_mut())
                .flat_map(|h| h.disks.iter_mut())
                .rev();
            for capacity in disks {
                if excess == 0 {
                    break;
                }
                let cut = excess.min(*capacity);
                *capacity -= cut;
                excess -= cut;
            }
        }

        scaled
    }
}

fn as_object<'a>(value: &'a Value, owner: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| anyhow!("'{}' must map to an object", owner))
}

/// Derives the zone name from a topology file name: `zone-<name>.top`, `topo-<name>.json` or
/// `topo-<name>.yaml`. Falls back to `default-zone`.
pub fn zone_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let patterns = [r"zone-(.*)\.top$", r"topo-(.*)\.(?:json|yaml)$"];
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .find_map(|re| re.captures(file_name).map(|caps| caps[1].to_string()))
        .unwrap_or_else(|| "default-zone".to_string())
}
