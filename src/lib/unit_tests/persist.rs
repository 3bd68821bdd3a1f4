// SPDX-License-Identifier: Apache-2.0

use serde_json::json;

use crate::{
    unit_tests::testlib::{new_net_config, new_tmp_dir},
    ConfigStore, ErrorKind, FileConfigStore, MemoryConfigStore, NetConfig,
};

fn sample_config() -> NetConfig {
    new_net_config(
        r#"---
networks:
  net1:
    bonding: bond0
    mtu: 9000
    defaultRoute: true
  net2:
    nic: eth2
    bridged: false
bonds:
  bond0:
    nics: [eth0, eth1]
    options: mode=4
"#,
    )
}

#[test]
fn test_memory_store() {
    let mut store = MemoryConfigStore::default();
    assert!(store.get().unwrap().is_empty());
    store.set(&sample_config()).unwrap();
    assert_eq!(store.get().unwrap(), sample_config());
}

#[test]
fn test_file_store_missing_dir_is_empty() {
    let dir = new_tmp_dir();
    let store = FileConfigStore::new(dir.join("not-created"));
    assert!(store.get().unwrap().is_empty());
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_file_store_save_and_load() {
    let dir = new_tmp_dir();
    let mut store = FileConfigStore::new(&dir);
    store.set(&sample_config()).unwrap();

    assert!(dir.join("nets").join("net1").is_file());
    assert!(dir.join("bonds").join("bond0").is_file());
    let loaded = FileConfigStore::new(&dir).get().unwrap();
    assert_eq!(loaded, sample_config());
    assert_eq!(loaded.networks["net1"]["mtu"], json!(9000));
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_file_store_drop_stale_entities() {
    let dir = new_tmp_dir();
    let mut store = FileConfigStore::new(&dir);
    store.set(&sample_config()).unwrap();
    let mut config = sample_config();
    config.remove_network("net2");
    config.remove_bonding("bond0");
    store.set(&config).unwrap();

    assert!(!dir.join("nets").join("net2").exists());
    assert!(!dir.join("bonds").join("bond0").exists());
    assert_eq!(store.get().unwrap(), config);
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_file_store_invalid_content() {
    let dir = new_tmp_dir();
    std::fs::create_dir_all(dir.join("nets")).unwrap();
    std::fs::write(dir.join("nets").join("net1"), "not json").unwrap();
    let result = FileConfigStore::new(&dir).get();
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConfigError);
    }
    std::fs::remove_dir_all(dir).ok();
}
