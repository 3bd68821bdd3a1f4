// SPDX-License-Identifier: Apache-2.0

use serde_json::{json, Value};

use crate::{canonize_request, unit_tests::testlib::new_request, ErrorKind};

#[test]
fn test_canonize_fill_defaults() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
"#,
    );
    canonize_request(&mut request).unwrap();
    let net1 = &request.networks["net1"];
    assert_eq!(net1["mtu"], json!(1500));
    assert_eq!(net1["bridged"], Value::Bool(true));
    assert_eq!(net1["stp"], Value::Bool(false));
    assert_eq!(net1["defaultRoute"], Value::Bool(false));
    assert_eq!(net1["nameservers"], json!([]));
    assert!(!net1.contains_key("vlan"));
}

#[test]
fn test_canonize_string_values() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
    mtu: "9000"
    vlan: "101"
    bridged: "false"
    defaultRoute: "true"
"#,
    );
    canonize_request(&mut request).unwrap();
    let net1 = &request.networks["net1"];
    assert_eq!(net1["mtu"], json!(9000));
    assert_eq!(net1["vlan"], json!(101));
    assert_eq!(net1["bridged"], Value::Bool(false));
    assert_eq!(net1["defaultRoute"], Value::Bool(true));
    assert!(!net1.contains_key("stp"));
}

#[test]
fn test_canonize_empty_vlan_removed() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
    vlan: ""
  net2:
    nic: eth1
    vlan: null
"#,
    );
    canonize_request(&mut request).unwrap();
    assert!(!request.networks["net1"].contains_key("vlan"));
    assert!(!request.networks["net2"].contains_key("vlan"));
}

#[test]
fn test_canonize_legacy_stp() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
    STP: "on"
"#,
    );
    canonize_request(&mut request).unwrap();
    let net1 = &request.networks["net1"];
    assert!(!net1.contains_key("STP"));
    assert_eq!(net1["stp"], Value::Bool(true));
}

#[test]
fn test_canonize_invalid_stp() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
    stp: maybe
"#,
    );
    let result = canonize_request(&mut request);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
        assert!(e.msg().starts_with("Network net1: "));
    }
}

#[test]
fn test_canonize_invalid_mtu() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth0
    mtu: big
"#,
    );
    let result = canonize_request(&mut request);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }
}

#[test]
fn test_canonize_removal_untouched() {
    let mut request = new_request(
        r#"---
networks:
  net1:
    remove: "true"
bondings:
  bond0:
    remove: 1
"#,
    );
    canonize_request(&mut request).unwrap();
    let net1 = &request.networks["net1"];
    assert_eq!(net1.len(), 1);
    assert_eq!(net1["remove"], Value::Bool(true));
    assert_eq!(request.bondings["bond0"]["remove"], Value::Bool(true));
}
