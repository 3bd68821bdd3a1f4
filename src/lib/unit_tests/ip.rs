// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use crate::{
    ip::{
        is_link_local_cidr, is_unspecified_ipv6, parse_ipv6_cidr,
        strip_zone_id,
    },
    netmask_to_prefix, prefix_to_netmask, ErrorKind,
};

#[test]
fn test_prefix_to_netmask() {
    assert_eq!(prefix_to_netmask(0).unwrap(), Ipv4Addr::new(0, 0, 0, 0));
    assert_eq!(
        prefix_to_netmask(24).unwrap(),
        Ipv4Addr::new(255, 255, 255, 0)
    );
    assert_eq!(
        prefix_to_netmask(32).unwrap(),
        Ipv4Addr::new(255, 255, 255, 255)
    );
    assert_eq!(
        prefix_to_netmask(33).unwrap_err().kind(),
        ErrorKind::ConfigError
    );
}

#[test]
fn test_netmask_to_prefix() {
    assert_eq!(netmask_to_prefix("255.255.255.0").unwrap(), 24);
    assert_eq!(netmask_to_prefix("255.255.252.0").unwrap(), 22);
    assert_eq!(netmask_to_prefix("0.0.0.0").unwrap(), 0);
    assert_eq!(netmask_to_prefix("255.255.255.255").unwrap(), 32);
}

#[test]
fn test_netmask_not_contiguous() {
    let result = netmask_to_prefix("255.0.255.0");
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }
    assert!(netmask_to_prefix("255.255.255").is_err());
}

#[test]
fn test_parse_ipv6_cidr() {
    let (ip, prefix) = parse_ipv6_cidr("2001:db8::1/64").unwrap();
    assert_eq!(ip.to_string(), "2001:db8::1");
    assert_eq!(prefix, 64);
    assert_eq!(parse_ipv6_cidr("2001:db8::1").unwrap().1, 128);
    assert!(parse_ipv6_cidr("2001:db8::1/129").is_err());
    assert!(parse_ipv6_cidr("192.0.2.1/24").is_err());
}

#[test]
fn test_ipv6_link_local_and_unspecified() {
    assert!(is_link_local_cidr("fe80::1/64"));
    assert!(!is_link_local_cidr("2001:db8::1/64"));
    assert!(!is_link_local_cidr("not-an-address"));
    assert!(is_unspecified_ipv6(""));
    assert!(is_unspecified_ipv6("::"));
    assert!(!is_unspecified_ipv6("2001:db8::fe"));
}

#[test]
fn test_strip_zone_id() {
    assert_eq!(strip_zone_id("fe80::1%eth0"), "fe80::1");
    assert_eq!(strip_zone_id("192.0.2.53"), "192.0.2.53");
}
