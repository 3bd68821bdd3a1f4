// SPDX-License-Identifier: Apache-2.0

use crate::{
    canonize_request,
    unit_tests::testlib::{new_net_config, new_request},
    validate, ErrorKind, HostNetError, NetConfig, NetInfo, NetInfoBond,
    NetInfoNic,
};

fn inventory() -> NetInfo {
    let mut netinfo = NetInfo::new();
    for nic in ["eth0", "eth1", "eth2"] {
        netinfo.nics.insert(nic.to_string(), NetInfoNic::default());
    }
    netinfo
        .bondings
        .insert("bond9".to_string(), NetInfoBond::default());
    netinfo
}

fn check(yaml: &str, running: &NetConfig) -> Result<(), HostNetError> {
    let mut request = new_request(yaml);
    canonize_request(&mut request)?;
    validate(&request, running, &inventory())
}

fn assert_error(yaml: &str, kind: ErrorKind) {
    let result = check(yaml, &NetConfig::new());
    assert!(result.is_err(), "Expecting {kind} for {yaml}");
    if let Err(e) = result {
        assert_eq!(e.kind(), kind);
    }
}

#[test]
fn test_validate_simple_networks() {
    check(
        r#"---
networks:
  net1:
    nic: eth0
    ipaddr: 192.0.2.10
    netmask: 255.255.255.0
    gateway: 192.0.2.1
    defaultRoute: true
    nameservers: [192.0.2.53, "fe80::1%eth0"]
  net2:
    bonding: bond0
    vlan: 100
    bridged: false
    bootproto: dhcp
    ipv6addr: "2001:db8::10/64"
    ipv6gateway: "2001:db8::1"
bondings:
  bond0:
    nics: [eth1, eth2]
    options: mode=802.3ad miimon=150
"#,
        &NetConfig::new(),
    )
    .unwrap();
}

#[test]
fn test_validate_bad_bond_name() {
    assert_error(
        r#"---
bondings:
  team0:
    nics: [eth0]
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_bond_without_nics() {
    assert_error(
        r#"---
bondings:
  bond0:
    options: mode=1
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_bond_unknown_nic() {
    assert_error(
        r#"---
bondings:
  bond0:
    nics: [eth0, eth7]
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_bond_bad_options() {
    assert_error(
        r#"---
bondings:
  bond0:
    nics: [eth0]
    options: mode=1 miimon
"#,
        ErrorKind::ConfigError,
    );
    assert_error(
        r#"---
bondings:
  bond0:
    nics: [eth0]
    options: mode=9
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_remove_unknown_bond() {
    assert_error(
        r#"---
bondings:
  bond0:
    remove: true
"#,
        ErrorKind::ConfigError,
    );
    check(
        r#"---
bondings:
  bond9:
    remove: true
"#,
        &NetConfig::new(),
    )
    .unwrap();
}

#[test]
fn test_validate_remove_network() {
    let running = new_net_config(
        r#"---
networks:
  net1:
    nic: eth0
"#,
    );
    check(
        r#"---
networks:
  net1:
    remove: true
"#,
        &running,
    )
    .unwrap();
    assert_error(
        r#"---
networks:
  net1:
    remove: true
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_remove_network_with_attributes() {
    let running = new_net_config(
        r#"---
networks:
  net1:
    nic: eth0
"#,
    );
    let result = check(
        r#"---
networks:
  net1:
    remove: true
    nic: eth0
"#,
        &running,
    );
    assert!(result.is_err());
}

#[test]
fn test_validate_bridge_name() {
    for name in ["bridge-name-too-long", "br:0", "br.0", "-br0", "br 0"] {
        let yaml = format!("---\nnetworks:\n  \"{name}\":\n    nic: eth0\n");
        assert_error(&yaml, ErrorKind::ConfigError);
    }
    // Bridgeless networks are not bound to device names
    check(
        r#"---
networks:
  long-network-name:
    nic: eth0
    bridged: false
"#,
        &NetConfig::new(),
    )
    .unwrap();
}

#[test]
fn test_validate_vlan_range() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    vlan: 4095
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_lower_device() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    bonding: bond9
"#,
        ErrorKind::ConfigError,
    );
    assert_error(
        r#"---
networks:
  net1:
    mtu: 1500
"#,
        ErrorKind::ConfigError,
    );
    assert_error(
        r#"---
networks:
  net1:
    nic: eth8
"#,
        ErrorKind::ConfigError,
    );
    assert_error(
        r#"---
networks:
  net1:
    bonding: bond1
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_bonding_removed_in_same_request() {
    assert_error(
        r#"---
networks:
  net1:
    bonding: bond9
bondings:
  bond9:
    remove: true
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_ipv4() {
    for yaml in [
        "---\nnetworks:\n  net1:\n    nic: eth0\n    ipaddr: 192.0.2.300\n    \
        prefix: 24\n",
        "---\nnetworks:\n  net1:\n    nic: eth0\n    ipaddr: 192.0.2.3\n",
        "---\nnetworks:\n  net1:\n    nic: eth0\n    ipaddr: 192.0.2.3\n    \
        prefix: 24\n    bootproto: dhcp\n",
        "---\nnetworks:\n  net1:\n    nic: eth0\n    gateway: 192.0.2.1\n",
        "---\nnetworks:\n  net1:\n    nic: eth0\n    ipaddr: 192.0.2.3\n    \
        netmask: 255.0.255.0\n",
        "---\nnetworks:\n  net1:\n    nic: eth0\n    ipaddr: 192.0.2.3\n    \
        prefix: 40\n",
    ] {
        assert_error(yaml, ErrorKind::ConfigError);
    }
}

#[test]
fn test_validate_ipv6() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    ipv6addr: "2001:db8::10/130"
"#,
        ErrorKind::ConfigError,
    );
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    ipv6gateway: 192.0.2.1
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_bad_nameserver() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    defaultRoute: true
    nameservers: [dns.example.com]
"#,
        ErrorKind::ConfigError,
    );
}

#[test]
fn test_validate_nameservers_without_default_route() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    nameservers: [192.0.2.53]
"#,
        ErrorKind::ValidationError,
    );
}

#[test]
fn test_validate_multiple_default_routes() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    defaultRoute: true
  net2:
    nic: eth1
    defaultRoute: true
"#,
        ErrorKind::ValidationError,
    );
}

#[test]
fn test_validate_default_route_merged_with_running() {
    let running = new_net_config(
        r#"---
networks:
  net1:
    nic: eth0
    defaultRoute: true
"#,
    );
    let result = check(
        r#"---
networks:
  net2:
    nic: eth1
    defaultRoute: true
"#,
        &running,
    );
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ValidationError);
    }

    // Moving the default route within the same request is fine
    check(
        r#"---
networks:
  net1:
    nic: eth0
    defaultRoute: false
  net2:
    nic: eth1
    defaultRoute: true
"#,
        &running,
    )
    .unwrap();
}

#[test]
fn test_validate_shared_lower_device() {
    assert_error(
        r#"---
networks:
  net1:
    nic: eth0
    bridged: false
  net2:
    nic: eth0
    bridged: false
"#,
        ErrorKind::ConfigError,
    );
    check(
        r#"---
networks:
  net1:
    nic: eth0
  net2:
    nic: eth0
    vlan: 10
  net3:
    nic: eth0
    vlan: 20
"#,
        &NetConfig::new(),
    )
    .unwrap();
}

#[test]
fn test_validate_shared_lower_device_with_kernel() {
    let netinfo: NetInfo = serde_yaml::from_str(
        r#"---
networks:
  net1:
    iface: net1
    bridged: true
    ports: [eth0.100]
nics:
  eth0: {}
  eth1: {}
vlans:
  eth0.100:
    iface: eth0
    vlanid: 100
"#,
    )
    .unwrap();
    let running = new_net_config(
        r#"---
networks:
  net1:
    nic: eth0
    vlan: 100
"#,
    );

    let mut request = new_request(
        r#"---
networks:
  net2:
    nic: eth0
    vlan: 100
"#,
    );
    canonize_request(&mut request).unwrap();
    let result = validate(&request, &running, &netinfo);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }

    // Freeing the device in the same request is fine
    let mut request = new_request(
        r#"---
networks:
  net1:
    remove: true
  net2:
    nic: eth0
    vlan: 100
"#,
    );
    canonize_request(&mut request).unwrap();
    validate(&request, &running, &netinfo).unwrap();
}
