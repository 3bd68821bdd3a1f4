// SPDX-License-Identifier: Apache-2.0

mod attributes;
mod bond;
mod bond_opts;
mod canonize;
mod conf;
mod configurator;
mod connectivity;
mod error;
mod ip;
mod kernel_config;
mod link;
mod net_config;
mod netinfo;
#[cfg(feature = "query_apply")]
mod nispor;
mod normalize;
mod persist;
mod qos;
#[cfg(feature = "query_apply")]
mod reaper;
mod setup;
mod sysfs;
#[cfg(test)]
mod unit_tests;
mod validator;

pub use crate::attributes::{BondAttributes, BootProto, NetworkAttributes};
pub use crate::bond::{
    bonds, with_bond_transaction, Bond, BondDriver, BondTransaction,
};
pub use crate::bond_opts::{
    bond_opts_to_string, default_bond_options, normalize_bond_options,
    parse_bond_options, strip_default_bond_options, BondMode,
};
pub use crate::canonize::canonize_request;
pub use crate::conf::{
    ConnectivitySection, DhcpSection, HostNetConfig, KernelSection,
    StoreSection, DEFAULT_DHCP_PID_DIR,
};
pub use crate::configurator::NetworkConfigurator;
pub use crate::connectivity::{
    ConnectivityGate, DEFAULT_CONNECTIVITY_TIMEOUT, DEFAULT_SENTINEL_PATH,
};
pub use crate::error::{ErrorKind, HostNetError};
pub use crate::ip::{netmask_to_prefix, prefix_to_netmask};
pub use crate::kernel_config::{ConfigDiff, KernelConfig};
pub use crate::link::LinkOps;
pub use crate::net_config::{NetAttrs, NetConfig};
pub use crate::netinfo::{
    NetInfo, NetInfoBond, NetInfoBridge, NetInfoNetwork, NetInfoNic,
    NetInfoProbe, NetInfoVlan, NetworkTopology,
};
#[cfg(feature = "query_apply")]
pub use crate::nispor::{NisporConfigurator, NisporProbe};
pub use crate::normalize::{normalize, DEFAULT_MTU};
pub use crate::persist::{
    ConfigStore, FileConfigStore, MemoryConfigStore,
    DEFAULT_PERSISTENT_CONFIG_DIR, DEFAULT_RUNNING_CONFIG_DIR,
};
#[cfg(feature = "query_apply")]
pub use crate::reaper::ChildReaper;
pub use crate::setup::{
    persist_running_config, restore_persistent_config, setup_networks,
    Backend, SetupOptions, SetupRequest,
};
pub use crate::sysfs::{SysfsNet, DEFAULT_SYSFS_ROOT};
pub use crate::validator::validate;
