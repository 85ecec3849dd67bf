use scan_table_rs::ports::parse_port_list;
use scan_table_rs::targets::{expand_cidr_to_ips, expand_range, parse_targets};
use std::net::{IpAddr, Ipv4Addr};

#[test]
fn cidr_excludes_network_and_broadcast() {
    let ips = expand_cidr_to_ips("10.0.0.0/30".parse().unwrap());
    assert_eq!(
        ips,
        vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        ]
    );
}

#[test]
fn range_is_inclusive() {
    let ips = expand_range(Ipv4Addr::new(10, 0, 0, 254), Ipv4Addr::new(10, 0, 1, 1)).unwrap();
    assert_eq!(ips.len(), 4);
    assert_eq!(ips[2], Ipv4Addr::new(10, 0, 1, 0));
}

#[test]
fn oversized_spec_rejected() {
    assert!(parse_targets("10.0.0.0/8").is_err());
}

#[test]
fn port_list_keeps_first_seen_order() {
    assert_eq!(parse_port_list("443,22-23,443, 80").unwrap(), vec![443, 22, 23, 80]);
}
