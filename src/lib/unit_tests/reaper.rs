// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use crate::{ChildReaper, ErrorKind};

#[test]
fn test_reaper_register_requires_running() {
    let reaper = ChildReaper::new(Duration::from_millis(50));
    let result = reaper.register(1);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::NotRegistered);
    }
}

#[test]
fn test_reaper_unregister_unknown() {
    let reaper = ChildReaper::new(Duration::from_millis(50));
    let result = reaper.unregister(12345);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::NotRegistered);
    }
}

#[test]
fn test_reaper_collects_exited_child() {
    let reaper = ChildReaper::new(Duration::from_millis(50));
    reaper.start().unwrap();
    assert!(reaper.is_running());
    let child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    reaper.register(pid).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while reaper.is_registered(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(!reaper.is_registered(pid));
    reaper.stop().unwrap();
    assert!(!reaper.is_running());
}

#[test]
fn test_reaper_unregister_running_child() {
    let reaper = ChildReaper::new(Duration::from_millis(50));
    reaper.start().unwrap();
    let mut child = std::process::Command::new("sleep")
        .arg("10")
        .spawn()
        .unwrap();
    let pid = child.id();
    reaper.register(pid).unwrap();
    assert!(reaper.is_registered(pid));
    reaper.unregister(pid).unwrap();
    assert!(!reaper.is_registered(pid));
    child.kill().unwrap();
    child.wait().unwrap();
}
