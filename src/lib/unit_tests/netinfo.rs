// SPDX-License-Identifier: Apache-2.0

use crate::{ErrorKind, NetInfo};

fn new_netinfo() -> NetInfo {
    serde_yaml::from_str(
        r#"---
networks:
  net1:
    iface: net1
    bridged: true
    ports: [bond0.10]
  net2:
    iface: eth2
    bridged: false
  net3:
    iface: net3
    bridged: true
    ports: [bond0]
nics:
  eth0: {}
  eth1: {}
  eth2: {}
bondings:
  bond0:
    slaves: [eth0, eth1]
vlans:
  bond0.10:
    iface: bond0
    vlanid: 10
"#,
    )
    .unwrap()
}

#[test]
fn test_netinfo_topology_bridged_vlan_bond() {
    let topology = new_netinfo()
        .nics_vlan_and_bonding_for_network("net1")
        .unwrap();
    assert_eq!(topology.nics, vec!["eth0", "eth1"]);
    assert_eq!(topology.vlan.as_deref(), Some("bond0.10"));
    assert_eq!(topology.vlan_id, Some(10));
    assert_eq!(topology.bonding.as_deref(), Some("bond0"));
}

#[test]
fn test_netinfo_topology_bridgeless_nic() {
    let topology = new_netinfo()
        .nics_vlan_and_bonding_for_network("net2")
        .unwrap();
    assert_eq!(topology.nics, vec!["eth2"]);
    assert_eq!(topology.vlan, None);
    assert_eq!(topology.bonding, None);
}

#[test]
fn test_netinfo_topology_unknown_network() {
    let result = new_netinfo().nics_vlan_and_bonding_for_network("net9");
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::Bug);
    }
}

#[test]
fn test_netinfo_lookups() {
    let netinfo = new_netinfo();
    assert_eq!(netinfo.bonding_for_nic("eth1"), Some("bond0"));
    assert_eq!(netinfo.bonding_for_nic("eth2"), None);
    assert_eq!(netinfo.vlans_for_iface("bond0"), vec![10]);
    assert_eq!(netinfo.networks_for_iface("bond0"), vec!["net3"]);
    assert_eq!(netinfo.networks_for_iface("eth2"), vec!["net2"]);
}
