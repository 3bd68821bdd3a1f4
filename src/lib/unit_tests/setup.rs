// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::json;

use crate::{
    persist_running_config, restore_persistent_config, setup_networks,
    unit_tests::testlib::{new_request, new_tmp_dir, MockKernel},
    Backend, ConnectivityGate, ErrorKind, KernelConfig, MemoryConfigStore,
    NetInfoProbe,
};

fn new_backend(kernel: &MockKernel, sentinel: &Path) -> Backend {
    Backend {
        probe: Box::new(kernel.clone()),
        bond_driver: Box::new(kernel.clone()),
        configurator: Box::new(kernel.clone()),
        running_store: Box::new(MemoryConfigStore::default()),
        persistent_store: Box::new(MemoryConfigStore::default()),
        connectivity: ConnectivityGate::new(sentinel),
    }
}

fn name_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

const BOND_NETWORK_REQUEST: &str = r#"---
networks:
  net1:
    bonding: bond0
    ipaddr: 192.0.2.10
    netmask: 255.255.255.0
bondings:
  bond0:
    nics: [eth0, eth1]
    options: mode=4 miimon=150
options:
  connectivityCheck: false
"#;

#[test]
fn test_setup_new_bond_and_network() {
    let kernel = MockKernel::new(&["eth0", "eth1", "eth2"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));

    setup_networks(&new_request(BOND_NETWORK_REQUEST), &mut backend)
        .unwrap();

    {
        let state = kernel.state();
        assert_eq!(state.bonds["bond0"].slaves, name_set(&["eth0", "eth1"]));
        assert_eq!(state.bonds["bond0"].options["mode"], "4");
        assert_eq!(state.networks["net1"]["bonding"], json!("bond0"));
        assert_eq!(state.networks["net1"]["stp"], json!(false));
    }
    let running = backend.running_store.get().unwrap();
    assert!(running.networks.contains_key("net1"));
    assert!(running.bonds.contains_key("bond0"));
    assert!(!running.networks["net1"].contains_key("remove"));

    let netinfo = kernel.probe(&running).unwrap();
    let diff = KernelConfig::new(&netinfo).unwrap().diff(&running).unwrap();
    assert!(diff.is_empty(), "{diff:?}");
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_unchanged_request_is_noop() {
    let kernel = MockKernel::new(&["eth0", "eth1"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    let request = new_request(BOND_NETWORK_REQUEST);

    setup_networks(&request, &mut backend).unwrap();
    setup_networks(&request, &mut backend).unwrap();

    let state = kernel.state();
    assert_eq!(state.add_network_count, 1);
    assert_eq!(state.remove_network_count, 0);
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_rollback_on_connectivity_loss() {
    let kernel = MockKernel::new(&["eth0", "eth1", "eth2"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    setup_networks(
        &new_request(
            r#"---
networks:
  net1:
    nic: eth0
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();
    let running_before = backend.running_store.get().unwrap();

    let result = setup_networks(
        &new_request(
            r#"---
networks:
  net2:
    bonding: bond0
    vlan: 10
bondings:
  bond0:
    nics: [eth1, eth2]
options:
  connectivityTimeout: 1
"#,
        ),
        &mut backend,
    );

    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConnectivityLost);
    }
    {
        let state = kernel.state();
        assert!(!state.bonds.contains_key("bond0"));
        assert!(!state.networks.contains_key("net2"));
        assert!(state.networks.contains_key("net1"));
    }
    assert_eq!(backend.running_store.get().unwrap(), running_before);
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_rollback_restores_changed_network() {
    let kernel = MockKernel::new(&["eth0", "eth1"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    setup_networks(
        &new_request(
            r#"---
networks:
  net1:
    nic: eth0
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();
    kernel
        .state_mut()
        .fail_add_network
        .insert("net2".to_string());

    let result = setup_networks(
        &new_request(
            r#"---
networks:
  net1:
    nic: eth0
    mtu: 9000
  net2:
    nic: eth1
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    );

    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::PluginFailure);
    }
    let state = kernel.state();
    assert_eq!(state.networks["net1"]["mtu"], json!("1500"));
    assert!(!state.networks.contains_key("net2"));
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_remove_network_and_bond() {
    let kernel = MockKernel::new(&["eth0", "eth1"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    setup_networks(&new_request(BOND_NETWORK_REQUEST), &mut backend)
        .unwrap();

    setup_networks(
        &new_request(
            r#"---
networks:
  net1:
    remove: true
bondings:
  bond0:
    remove: true
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();

    {
        let state = kernel.state();
        assert!(state.networks.is_empty());
        assert!(state.bonds.is_empty());
    }
    assert!(backend.running_store.get().unwrap().is_empty());
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_edit_bond_slaves_and_options() {
    let kernel = MockKernel::new(&["eth0", "eth1", "eth2"]);
    kernel.add_bond("bond0", &["eth0", "eth1"]);
    {
        let mut state = kernel.state_mut();
        let options = &mut state.bonds.get_mut("bond0").unwrap().options;
        options.insert("mode".to_string(), "4".to_string());
        options.insert("miimon".to_string(), "150".to_string());
    }
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));

    setup_networks(
        &new_request(
            r#"---
bondings:
  bond0:
    nics: [eth2, eth1]
    options: mode=802.3ad
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();

    let state = kernel.state();
    assert_eq!(state.bonds["bond0"].slaves, name_set(&["eth1", "eth2"]));
    assert_eq!(state.bonds["bond0"].options["miimon"], "100");
    assert_eq!(state.bonds["bond0"].options["mode"], "4");
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_invalid_request_changes_nothing() {
    let kernel = MockKernel::new(&["eth0"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    let mut request = new_request(
        r#"---
networks:
  net1:
    nic: eth9
options:
  connectivityCheck: false
"#,
    );

    let result = setup_networks(&request, &mut backend);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }
    assert_eq!(kernel.state().add_network_count, 0);
    assert!(backend.running_store.get().unwrap().is_empty());

    request.options.force = true;
    setup_networks(&request, &mut backend).unwrap();
    assert_eq!(kernel.state().add_network_count, 1);
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_setup_persist_and_restore() {
    let kernel = MockKernel::new(&["eth0", "eth1"]);
    let dir = new_tmp_dir();
    let mut backend = new_backend(&kernel, &dir.join("client.log"));
    setup_networks(
        &new_request(
            r#"---
networks:
  net1:
    nic: eth0
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();
    persist_running_config(&mut backend).unwrap();
    setup_networks(
        &new_request(
            r#"---
networks:
  net2:
    nic: eth1
    bridged: false
options:
  connectivityCheck: false
"#,
        ),
        &mut backend,
    )
    .unwrap();
    assert!(kernel.state().networks.contains_key("net2"));

    restore_persistent_config(&mut backend).unwrap();

    {
        let state = kernel.state();
        assert!(state.networks.contains_key("net1"));
        assert!(!state.networks.contains_key("net2"));
    }
    assert_eq!(
        backend.running_store.get().unwrap(),
        backend.persistent_store.get().unwrap()
    );
    std::fs::remove_dir_all(dir).ok();
}
