// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    unit_tests::testlib::new_tmp_dir, ChildReaper, DhcpSection,
    NisporConfigurator, SysfsNet,
};

const IFACE: &str = "hnet-test0";

fn new_configurator(
    dir: &Path,
    reaper: &Arc<ChildReaper>,
) -> NisporConfigurator {
    let mut dhcp = DhcpSection::default();
    // Stays alive without exec'ing away the interface argument
    dhcp.command = "sh".to_string();
    dhcp.args = vec![
        "-c".to_string(),
        "sleep 30; true".to_string(),
        "dhcp".to_string(),
    ];
    dhcp.pid_dir = dir.join("dhcp").display().to_string();
    NisporConfigurator::new(SysfsNet::new(dir), dhcp, reaper.clone())
}

#[test]
fn test_dhcp_client_stopped_by_new_configurator() {
    let dir = new_tmp_dir();
    let reaper = Arc::new(ChildReaper::new(Duration::from_millis(50)));
    reaper.start().unwrap();
    let pid_file = dir.join("dhcp").join(format!("{IFACE}.pid"));

    let pid = new_configurator(&dir, &reaper)
        .start_dhcp_client(IFACE, false)
        .unwrap();
    assert_eq!(std::fs::read_to_string(&pid_file).unwrap(), pid.to_string());

    new_configurator(&dir, &reaper).stop_dhcp_client(IFACE);

    assert!(!pid_file.exists());
    let deadline = Instant::now() + Duration::from_secs(5);
    while reaper.is_registered(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(!reaper.is_registered(pid));
    reaper.stop().unwrap();
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_dhcp_client_stale_pid_file() {
    let dir = new_tmp_dir();
    let reaper = Arc::new(ChildReaper::new(Duration::from_millis(50)));
    reaper.start().unwrap();
    let pid_file = dir.join("dhcp").join(format!("{IFACE}.pid"));
    std::fs::create_dir_all(dir.join("dhcp")).unwrap();
    // A recycled pid serving something else must not be signalled
    std::fs::write(&pid_file, std::process::id().to_string()).unwrap();

    new_configurator(&dir, &reaper).stop_dhcp_client(IFACE);

    assert!(!pid_file.exists());
    reaper.stop().unwrap();
    std::fs::remove_dir_all(dir).ok();
}
