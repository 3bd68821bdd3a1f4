// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::{
    bond::BondDriver, bond_opts::EXCLUDED_BONDING_ENTRIES, link::LinkOps,
    ErrorKind, HostNetError,
};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

const IFF_UP: u32 = 0x1;

/// Network devices as exposed under `<root>/class/net`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsNet {
    root: PathBuf,
}

impl Default for SysfsNet {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl SysfsNet {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn net_path(&self) -> PathBuf {
        self.root.join("class").join("net")
    }

    fn dev_path(&self, dev: &str) -> PathBuf {
        self.net_path().join(dev)
    }

    fn bonding_masters(&self) -> PathBuf {
        self.net_path().join("bonding_masters")
    }

    fn bonding_path(&self, bond: &str) -> PathBuf {
        self.dev_path(bond).join("bonding")
    }

    pub fn mtu(&self, dev: &str) -> Result<u64, HostNetError> {
        let path = self.dev_path(dev).join("mtu");
        let content = read_sysfs(&path)?;
        content.parse::<u64>().map_err(|e| {
            HostNetError::new(
                ErrorKind::PluginFailure,
                format!("Invalid MTU {content:?} in {}: {e}", path.display()),
            )
        })
    }

    pub fn set_mtu(&self, dev: &str, mtu: u64) -> Result<(), HostNetError> {
        write_sysfs(&self.dev_path(dev).join("mtu"), &mtu.to_string())?;
        log::info!("MTU of {} set to {}", dev, mtu);
        Ok(())
    }

    /// Raw STP state of a bridge: `0` disabled, `1` kernel, `2` user space.
    pub fn bridge_stp_state(&self, bridge: &str) -> Option<String> {
        let path = self.dev_path(bridge).join("bridge").join("stp_state");
        match read_sysfs(&path) {
            Ok(s) => Some(s),
            Err(e) => {
                log::debug!("Cannot read STP state of {}: {}", bridge, e);
                None
            }
        }
    }

    pub fn set_bridge_stp(
        &self,
        bridge: &str,
        enabled: bool,
    ) -> Result<(), HostNetError> {
        let path = self.dev_path(bridge).join("bridge").join("stp_state");
        write_sysfs(&path, if enabled { "1" } else { "0" })?;
        log::info!("STP of bridge {} set to {}", bridge, enabled);
        Ok(())
    }

    fn flags(&self, dev: &str) -> Result<u32, HostNetError> {
        let path = self.dev_path(dev).join("flags");
        let content = read_sysfs(&path)?;
        u32::from_str_radix(content.trim_start_matches("0x"), 16).map_err(
            |e| {
                HostNetError::new(
                    ErrorKind::PluginFailure,
                    format!(
                        "Invalid flags {content:?} in {}: {e}",
                        path.display()
                    ),
                )
            },
        )
    }

    fn set_flags(&self, dev: &str, flags: u32) -> Result<(), HostNetError> {
        write_sysfs(&self.dev_path(dev).join("flags"), &format!("{flags:#x}"))
    }
}

impl LinkOps for SysfsNet {
    fn link_exists(&self, dev: &str) -> bool {
        self.dev_path(dev).exists()
    }

    fn is_up(&self, dev: &str) -> Result<bool, HostNetError> {
        Ok(self.flags(dev)? & IFF_UP > 0)
    }

    fn up(&self, dev: &str) -> Result<(), HostNetError> {
        let flags = self.flags(dev)?;
        self.set_flags(dev, flags | IFF_UP)?;
        log::info!("Link {} set up", dev);
        Ok(())
    }

    fn down(&self, dev: &str) -> Result<(), HostNetError> {
        let flags = self.flags(dev)?;
        self.set_flags(dev, flags & !IFF_UP)?;
        log::info!("Link {} set down", dev);
        Ok(())
    }
}

impl BondDriver for SysfsNet {
    fn bond_exists(&self, bond: &str) -> bool {
        self.bonding_path(bond).exists()
    }

    fn create_bond(&self, bond: &str) -> Result<(), HostNetError> {
        write_sysfs(&self.bonding_masters(), &format!("+{bond}"))
    }

    fn destroy_bond(&self, bond: &str) -> Result<(), HostNetError> {
        write_sysfs(&self.bonding_masters(), &format!("-{bond}"))
    }

    fn add_slave(&self, bond: &str, slave: &str) -> Result<(), HostNetError> {
        write_sysfs(
            &self.bonding_path(bond).join("slaves"),
            &format!("+{slave}"),
        )
    }

    fn del_slave(&self, bond: &str, slave: &str) -> Result<(), HostNetError> {
        write_sysfs(
            &self.bonding_path(bond).join("slaves"),
            &format!("-{slave}"),
        )
    }

    fn set_option(
        &self,
        bond: &str,
        key: &str,
        value: &str,
    ) -> Result<(), HostNetError> {
        write_sysfs(&self.bonding_path(bond).join(key), value)
    }

    fn slaves(&self, bond: &str) -> Result<BTreeSet<String>, HostNetError> {
        Ok(read_sysfs(&self.bonding_path(bond).join("slaves"))?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    fn options(
        &self,
        bond: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, HostNetError> {
        let mut ret = BTreeMap::new();
        for entry in std::fs::read_dir(self.bonding_path(bond))? {
            let entry = entry?;
            let key = entry.file_name().to_string_lossy().to_string();
            if EXCLUDED_BONDING_ENTRIES.contains(&key.as_str()) {
                continue;
            }
            // Some entries are write only or not valid for the current mode
            match read_sysfs(&entry.path()) {
                Ok(content) => {
                    ret.insert(
                        key,
                        content
                            .split_whitespace()
                            .map(str::to_string)
                            .collect(),
                    );
                }
                Err(e) => {
                    log::debug!("Skipping bond {} option {}: {}", bond, key, e)
                }
            }
        }
        Ok(ret)
    }

    fn active_slave(&self, bond: &str) -> Result<String, HostNetError> {
        read_sysfs(&self.bonding_path(bond).join("active_slave"))
    }

    fn bonds(&self) -> Result<Vec<String>, HostNetError> {
        match read_sysfs(&self.bonding_masters()) {
            Ok(content) => {
                Ok(content.split_whitespace().map(str::to_string).collect())
            }
            // Bonding module not loaded
            Err(_) if !self.bonding_masters().exists() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

fn read_sysfs(path: &Path) -> Result<String, HostNetError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            HostNetError::new(
                ErrorKind::PluginFailure,
                format!("Failed to read {}: {e}", path.display()),
            )
        })
}

fn write_sysfs(path: &Path, content: &str) -> Result<(), HostNetError> {
    log::debug!("Writing {:?} to {}", content, path.display());
    std::fs::write(path, content).map_err(|e| {
        HostNetError::new(
            ErrorKind::PluginFailure,
            format!("Failed to write {content:?} to {}: {e}", path.display()),
        )
    })
}
