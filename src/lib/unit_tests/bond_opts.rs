// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::{
    bond_opts::running_bond_options, bond_opts_to_string,
    default_bond_options, normalize_bond_options, parse_bond_options,
    strip_default_bond_options, BondMode, ErrorKind,
};

#[test]
fn test_bond_mode_name_and_id() {
    assert_eq!(
        BondMode::from_name_or_id("802.3ad"),
        Some(BondMode::LACP)
    );
    assert_eq!(BondMode::from_name_or_id("4"), Some(BondMode::LACP));
    assert_eq!(BondMode::from_name_or_id("7"), None);
    assert_eq!(BondMode::ActiveBackup.id(), "1");
    assert_eq!(BondMode::ActiveBackup.name(), "active-backup");
    assert_eq!(BondMode::default(), BondMode::RoundRobin);
}

#[test]
fn test_default_bond_options_mode() {
    assert_eq!(
        default_bond_options(BondMode::RoundRobin).get("mode"),
        Some(&"0")
    );
    assert_eq!(default_bond_options(BondMode::LACP).get("mode"), None);
    assert_eq!(
        default_bond_options(BondMode::LACP).get("miimon"),
        Some(&"100")
    );
}

#[test]
fn test_parse_bond_options_skip_malformed() {
    let opts = parse_bond_options("mode=1  miimon=150 garbage");
    assert_eq!(opts.len(), 2);
    assert_eq!(opts["mode"], "1");
    assert_eq!(opts["miimon"], "150");
}

#[test]
fn test_bond_opts_to_string_sorted() {
    let mut opts = BTreeMap::new();
    opts.insert("mode".to_string(), "1".to_string());
    opts.insert("miimon".to_string(), "150".to_string());
    assert_eq!(bond_opts_to_string(&opts), "miimon=150 mode=1");
    assert_eq!(bond_opts_to_string(&BTreeMap::new()), "");
}

#[test]
fn test_strip_default_bond_options() {
    let opts = parse_bond_options("mode=0 miimon=100 updelay=200");
    let stripped = strip_default_bond_options(opts).unwrap();
    assert_eq!(bond_opts_to_string(&stripped), "updelay=200");
}

#[test]
fn test_strip_default_bond_options_keep_non_default_mode() {
    let opts = parse_bond_options("mode=active-backup fail_over_mac=active");
    let stripped = strip_default_bond_options(opts).unwrap();
    assert_eq!(bond_opts_to_string(&stripped), "fail_over_mac=1 mode=1");
}

#[test]
fn test_normalize_bond_options_equivalent_forms() {
    assert_eq!(
        normalize_bond_options(Some("mode=802.3ad lacp_rate=fast")).unwrap(),
        normalize_bond_options(Some("lacp_rate=1 mode=4 miimon=100"))
            .unwrap()
    );
    assert_eq!(normalize_bond_options(None).unwrap(), "");
    assert_eq!(normalize_bond_options(Some("custom=a:b")).unwrap(), "");
}

#[test]
fn test_normalize_bond_options_unknown_mode() {
    let result = normalize_bond_options(Some("mode=broken"));
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }
}

#[test]
fn test_running_bond_options_from_sysfs() {
    let mut raw: BTreeMap<String, Vec<String>> = BTreeMap::new();
    raw.insert(
        "mode".to_string(),
        vec!["active-backup".to_string(), "1".to_string()],
    );
    raw.insert("miimon".to_string(), vec!["100".to_string()]);
    raw.insert("arp_ip_target".to_string(), Vec::new());
    raw.insert("slaves".to_string(), vec!["eth0".to_string()]);
    let opts = running_bond_options(&raw).unwrap();
    assert_eq!(bond_opts_to_string(&opts), "mode=1");
}

#[test]
fn test_normalize_bond_options_default_hash_policy() {
    assert_eq!(
        normalize_bond_options(Some("mode=1 xmit_hash_policy=layer2"))
            .unwrap(),
        "mode=1"
    );
    assert_eq!(
        normalize_bond_options(Some("mode=4 lacp_active=on")).unwrap(),
        "mode=4"
    );
    assert_eq!(
        normalize_bond_options(Some("mode=2 xmit_hash_policy=layer3+4"))
            .unwrap(),
        "mode=2 xmit_hash_policy=1"
    );
}

// Full listing of /sys/class/net/<bond>/bonding of a new balance-rr bond
const FRESH_BOND_SYSFS: &str = r#"---
active_slave: []
ad_actor_sys_prio: ["65535"]
ad_actor_system: ["00:00:00:00:00:00"]
ad_aggregator: []
ad_num_ports: []
ad_select: ["stable", "0"]
ad_user_port_key: ["0"]
all_slaves_active: ["0"]
arp_all_targets: ["any", "0"]
arp_interval: ["0"]
arp_ip_target: []
arp_missed_max: ["2"]
arp_validate: ["none", "0"]
coupled_control: ["1"]
downdelay: ["0"]
fail_over_mac: ["none", "0"]
lacp_active: ["on", "1"]
lacp_rate: ["slow", "0"]
lp_interval: ["1"]
miimon: ["100"]
mii_status: ["down"]
min_links: ["0"]
mode: ["balance-rr", "0"]
ns_ip6_target: []
num_grat_arp: ["1"]
num_unsol_na: ["1"]
packets_per_slave: ["1"]
peer_notif_delay: ["0"]
primary: [""]
primary_reselect: ["always", "0"]
queue_id: []
resend_igmp: ["1"]
slaves: []
tlb_dynamic_lb: ["1"]
updelay: ["0"]
use_carrier: ["1"]
xmit_hash_policy: ["layer2", "0"]
"#;

#[test]
fn test_running_bond_options_fresh_bond_is_empty() {
    let raw: BTreeMap<String, Vec<String>> =
        serde_yaml::from_str(FRESH_BOND_SYSFS).unwrap();
    assert!(running_bond_options(&raw).unwrap().is_empty());
}
