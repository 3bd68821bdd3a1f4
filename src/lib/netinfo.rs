// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ErrorKind, HostNetError, NetConfig};

/// Source of the kernel read model.
pub trait NetInfoProbe {
    /// `running` names the networks to look for, networks are not a kernel
    /// concept.
    fn probe(&self, running: &NetConfig) -> Result<NetInfo, HostNetError>;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
/// Raw, kernel-reported state of a network.
pub struct NetInfoNetwork {
    /// Bridge name for bridged networks, top interface (nic, bond or vlan)
    /// otherwise.
    pub iface: String,
    pub bridged: bool,
    /// Bridge ports, empty for bridgeless networks.
    pub ports: Vec<String>,
    /// Bridge STP state as found in sysfs (`0`, `1` or `2`).
    pub stp: Option<String>,
    pub mtu: String,
    /// Primary IPv4 address, empty string when unset.
    pub addr: String,
    pub netmask: String,
    pub gateway: String,
    pub ipv4addrs: Vec<String>,
    pub ipv6addrs: Vec<String>,
    pub ipv6gateway: String,
    pub dhcpv4: bool,
    pub dhcpv6: bool,
    /// Configurator specific key/value pairs such as `DEFROUTE`.
    pub cfg: HashMap<String, String>,
    #[serde(rename = "hostQos", skip_serializing_if = "Option::is_none")]
    pub host_qos: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct NetInfoNic {
    pub hwaddr: String,
    pub mtu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct NetInfoBond {
    pub hwaddr: String,
    pub slaves: Vec<String>,
    pub active_slave: String,
    /// Non-default options in numeric form, e.g. `{"mode": "4"}`.
    pub opts: BTreeMap<String, String>,
    pub mtu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct NetInfoVlan {
    /// Base interface of the vlan.
    pub iface: String,
    pub vlanid: u16,
    pub mtu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct NetInfoBridge {
    pub ports: Vec<String>,
    pub stp: Option<String>,
    pub mtu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
/// Devices carrying a network, see
/// [NetInfo::nics_vlan_and_bonding_for_network()].
pub struct NetworkTopology {
    pub nics: Vec<String>,
    /// Name of the vlan device, vlan devices can have arbitrary names.
    pub vlan: Option<String>,
    pub vlan_id: Option<u16>,
    pub bonding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
/// Read model of the host network: networks plus the devices beneath them.
///
/// Produced by a [crate::NetInfoProbe] and consumed by
/// [crate::KernelConfig].
pub struct NetInfo {
    pub networks: BTreeMap<String, NetInfoNetwork>,
    pub nics: BTreeMap<String, NetInfoNic>,
    pub bondings: BTreeMap<String, NetInfoBond>,
    pub vlans: BTreeMap<String, NetInfoVlan>,
    pub bridges: BTreeMap<String, NetInfoBridge>,
}

impl NetInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the nics, vlan and bond a network is built on.
    ///
    /// For a bond every slave is listed in `nics`.
    pub fn nics_vlan_and_bonding_for_network(
        &self,
        network: &str,
    ) -> Result<NetworkTopology, HostNetError> {
        let net_info = self.networks.get(network).ok_or_else(|| {
            HostNetError::new(
                ErrorKind::Bug,
                format!("Network {network} not found in netinfo"),
            )
        })?;
        let ports: Vec<&str> = if net_info.bridged {
            net_info.ports.iter().map(String::as_str).collect()
        } else {
            vec![net_info.iface.as_str()]
        };

        let mut ret = NetworkTopology::default();
        for port in ports {
            let mut port = port;
            if let Some(vlan_info) = self.vlans.get(port) {
                if ret.vlan.is_some() {
                    return Err(multiple_err(network, "vlans"));
                }
                ret.vlan = Some(port.to_string());
                ret.vlan_id = Some(vlan_info.vlanid);
                port = vlan_info.iface.as_str();
            }
            if let Some(bond_info) = self.bondings.get(port) {
                if ret.bonding.is_some() {
                    return Err(multiple_err(network, "bonds"));
                }
                ret.bonding = Some(port.to_string());
                ret.nics.extend(bond_info.slaves.iter().cloned());
            } else if self.nics.contains_key(port) {
                ret.nics.push(port.to_string());
            }
        }
        Ok(ret)
    }

    pub fn bonding_for_nic(&self, nic: &str) -> Option<&str> {
        self.bondings
            .iter()
            .find(|(_, bond)| bond.slaves.iter().any(|s| s == nic))
            .map(|(name, _)| name.as_str())
    }

    pub fn vlans_for_iface(&self, iface: &str) -> Vec<u16> {
        self.vlans
            .values()
            .filter(|vlan| vlan.iface == iface)
            .map(|vlan| vlan.vlanid)
            .collect()
    }

    /// Networks using the interface either directly or through a bridge.
    pub fn networks_for_iface(&self, iface: &str) -> Vec<&str> {
        self.networks
            .iter()
            .filter(|(_, net)| {
                net.iface == iface || net.ports.iter().any(|p| p == iface)
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

fn multiple_err(network: &str, what: &str) -> HostNetError {
    HostNetError::new(
        ErrorKind::Bug,
        format!("Network {network} is built on multiple {what}"),
    )
}
