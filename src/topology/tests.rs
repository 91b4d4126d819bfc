//! Topology Module Tests
//!
//! Validates tree construction, indexing and the topology input formats.
//!
//! ## Test Scopes
//! - **Zone**: global indexing, contiguous disk ranges, capacities and disjoint groups.
//! - **Loader**: JSON and `.top` parsing, fill-level scaling and zone naming.

#[cfg(test)]
mod tests {
    use crate::topology::{HostSpec, Level, TopologySpec, UnitRef, Zone, zone_name_from_path};
    use std::path::Path;

    fn two_rack_spec() -> TopologySpec {
        TopologySpec::from_json_str(
            r#"{
                "rack-a": {"ch-1": {"alpha": [4, 4], "beta": [2]}},
                "rack-b": {"ch-2": {"gamma": [3]}, "ch-3": {"delta": [1, 0]}}
            }"#,
        )
        .unwrap()
    }

    // ============================================================
    // ZONE CONSTRUCTION TESTS
    // ============================================================

    #[test]
    fn test_zone_counts_and_capacity() {
        let zone = Zone::build("z", &two_rack_spec());

        assert_eq!(zone.count(Level::Zone), 1);
        assert_eq!(zone.count(Level::Rack), 2);
        assert_eq!(zone.count(Level::Chassis), 3);
        assert_eq!(zone.count(Level::Host), 4);
        assert_eq!(zone.count(Level::Disk), 6);
        assert_eq!(zone.count(Level::Location), 14);
        assert_eq!(zone.capacity(), 14, "Zone capacity is the location count");
    }

    #[test]
    fn test_disk_and_location_names() {
        let zone = Zone::build("z", &two_rack_spec());

        let names: Vec<&str> = zone.disks().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["alpha[1]", "alpha[2]", "beta[1]", "gamma[1]", "delta[1]", "delta[2]"]
        );
        assert_eq!(zone.units(Level::Location)[0].name, "alpha[1][1]");
        assert_eq!(zone.disk_by_name("gamma[1]"), Some(3));
        assert_eq!(zone.disk_by_name("gamma[2]"), None);
    }

    #[test]
    fn test_ranges_are_contiguous_depth_first() {
        let zone = Zone::build("z", &two_rack_spec());

        let rack_b = zone.unit(UnitRef::new(Level::Rack, 1));
        assert_eq!(rack_b.disks, 3..6);
        assert_eq!(rack_b.locations, 10..14);
        assert_eq!(rack_b.capacity, 4);

        let alpha = zone.unit(UnitRef::new(Level::Host, 0));
        assert_eq!(alpha.disks, 0..2);
        assert_eq!(alpha.capacity, 8);

        // Zero-capacity disk still exists with an empty location range
        let empty = zone.disk(5);
        assert_eq!(empty.capacity, 0);
        assert!(empty.locations.is_empty());
        assert_eq!(empty.disks, 5..6);
    }

    #[test]
    fn test_parent_child_links() {
        let zone = Zone::build("z", &two_rack_spec());

        let disk = UnitRef::new(Level::Disk, 4);
        let host = zone.parent(disk).unwrap();
        assert_eq!(zone.unit(host).name, "delta");
        assert_eq!(
            zone.ancestor(disk, Level::Rack),
            Some(UnitRef::new(Level::Rack, 1))
        );
        assert_eq!(zone.ancestor(disk, Level::Location), None);

        assert_eq!(zone.unit(UnitRef::new(Level::Rack, 1)).children, vec![1, 2]);
        assert!(zone.parent(UnitRef::new(Level::Zone, 0)).is_none());
    }

    #[test]
    fn test_disjoint_groups_by_level() {
        let zone = Zone::build("z", &two_rack_spec());

        assert_eq!(zone.disjoint_group(1, Level::Rack), 0..3);
        assert_eq!(zone.disjoint_group(1, Level::Host), 0..2);
        assert_eq!(zone.disjoint_group(1, Level::Disk), 1..2);
        assert!(zone.same_group(3, 5, Level::Rack));
        assert!(!zone.same_group(3, 5, Level::Chassis));
    }

    // ============================================================
    // LOADER TESTS
    // ============================================================

    #[test]
    fn test_json_preserves_declaration_order() {
        let spec = TopologySpec::from_json_str(r#"{"zz": {"c": {"h2": [1], "h1": [2]}}, "aa": {"c": {"h0": [3]}}}"#)
            .unwrap();

        assert_eq!(spec.racks[0].name, "zz");
        assert_eq!(spec.racks[1].name, "aa");
        assert_eq!(spec.racks[0].chassis[0].hosts[0].name, "h2");
        assert_eq!(spec.total_capacity(), 6);
    }

    #[test]
    fn test_json_rejects_bad_shapes() {
        assert!(TopologySpec::from_json_str(r#"{"r": {"c": {"h": "big"}}}"#).is_err());
        assert!(TopologySpec::from_json_str(r#"{"r": {"c": {"h": [1, -2]}}}"#).is_err());
        assert!(TopologySpec::from_json_str(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let spec = two_rack_spec();
        let reparsed = TopologySpec::from_json_str(&spec.to_json_value().to_string()).unwrap();
        assert_eq!(spec, reparsed);
    }

    #[test]
    fn test_top_format() {
        let content = "\
host orphan ssd 5

# rack r1 chassis c1
host alpha hdd 10 10
host beta hdd 7
host alpha hdd 99
# rack r1 chassis c2
host gamma hdd 3 4 5
";
        let spec = TopologySpec::from_top_str(content).unwrap();

        assert_eq!(spec.racks.len(), 2);
        assert_eq!(spec.racks[0].name, "default-rack");
        assert_eq!(spec.racks[0].chassis[0].name, "default-chassis");
        assert_eq!(spec.racks[1].name, "r1");
        assert_eq!(spec.racks[1].chassis.len(), 2);

        let c1 = &spec.racks[1].chassis[0];
        assert_eq!(
            c1.hosts,
            vec![
                HostSpec { name: "alpha".into(), disks: vec![10, 10] },
                HostSpec { name: "beta".into(), disks: vec![7] },
            ],
            "Duplicate host keeps its first entry"
        );
        assert_eq!(spec.racks[1].chassis[1].hosts[0].disks, vec![3, 4, 5]);
    }

    #[test]
    fn test_top_format_without_hosts_is_rejected() {
        assert!(TopologySpec::from_top_str("just a comment\n").is_err());
    }

    #[test]
    fn test_scaling_carries_fractions() {
        let spec = TopologySpec::from_json_str(r#"{"r": {"c": {"h": [5, 5, 5]}}}"#).unwrap();

        // 5*0.5 = 2.5 -> 2 (carry .5), 3.0 -> 3, 2.5 -> 2: total 7, trimmed to 6
        let scaled = spec.scaled(0.5, 3);
        assert_eq!(scaled.racks[0].chassis[0].hosts[0].disks, vec![2, 3, 1]);
        assert_eq!(scaled.total_capacity() % 3, 0);
    }

    #[test]
    fn test_scaling_trim_spills_over_small_last_disk() {
        let spec = TopologySpec::from_json_str(r#"{"r": {"c": {"h": [4, 1]}}}"#).unwrap();

        let scaled = spec.scaled(1.0, 3);
        assert_eq!(scaled.racks[0].chassis[0].hosts[0].disks, vec![3, 0]);
    }

    #[test]
    fn test_full_fill_keeps_divisible_capacities() {
        let spec = two_rack_spec();
        let scaled = spec.scaled(1.0, 1);
        assert_eq!(scaled, spec);
    }

    #[test]
    fn test_zone_name_from_file_name() {
        assert_eq!(zone_name_from_path(Path::new("/data/zone-east.top")), "east");
        assert_eq!(zone_name_from_path(Path::new("topo-west.json")), "west");
        assert_eq!(zone_name_from_path(Path::new("topo-legacy.yaml")), "legacy");
        assert_eq!(zone_name_from_path(Path::new("cluster.json")), "default-zone");
    }
}
