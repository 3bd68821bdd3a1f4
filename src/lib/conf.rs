// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{
    connectivity::{DEFAULT_CONNECTIVITY_TIMEOUT, DEFAULT_SENTINEL_PATH},
    persist::{DEFAULT_PERSISTENT_CONFIG_DIR, DEFAULT_RUNNING_CONFIG_DIR},
    sysfs::DEFAULT_SYSFS_ROOT,
};

const DEFAULT_DHCP_CLIENT: &str = "dhclient";
pub const DEFAULT_DHCP_PID_DIR: &str = "/var/run/hostnet/dhcp";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
/// Host level settings of the engine, every section is optional.
///
/// Example in TOML:
/// ```toml
/// [kernel]
/// sysfs_root = "/sys"
///
/// [store]
/// running_dir = "/var/run/hostnet/netconf"
///
/// [connectivity]
/// timeout = 10
///
/// [dhcp]
/// command = "dhclient"
/// args = ["-1"]
/// ```
pub struct HostNetConfig {
    pub kernel: KernelSection,
    pub store: StoreSection,
    pub connectivity: ConnectivitySection,
    pub dhcp: DhcpSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct KernelSection {
    pub sysfs_root: String,
}

impl Default for KernelSection {
    fn default() -> Self {
        Self {
            sysfs_root: DEFAULT_SYSFS_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct StoreSection {
    pub running_dir: String,
    /// Configuration restored on boot.
    pub persistent_dir: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            running_dir: DEFAULT_RUNNING_CONFIG_DIR.to_string(),
            persistent_dir: DEFAULT_PERSISTENT_CONFIG_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ConnectivitySection {
    pub sentinel_path: String,
    /// Seconds, used when a request does not carry its own timeout.
    pub timeout: u64,
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        Self {
            sentinel_path: DEFAULT_SENTINEL_PATH.to_string(),
            timeout: DEFAULT_CONNECTIVITY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct DhcpSection {
    pub command: String,
    /// Arguments placed before the interface name. `-6` is appended for
    /// DHCPv6.
    pub args: Vec<String>,
    /// Holds `<iface>.pid` of every running client.
    pub pid_dir: String,
}

impl Default for DhcpSection {
    fn default() -> Self {
        Self {
            command: DEFAULT_DHCP_CLIENT.to_string(),
            args: Vec::new(),
            pid_dir: DEFAULT_DHCP_PID_DIR.to_string(),
        }
    }
}
