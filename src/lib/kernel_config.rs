// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::{
    bond_opts::bond_opts_to_string,
    ip::{is_link_local_cidr, is_unspecified_ipv6},
    net_config::stp_to_bool,
    netinfo::{NetInfoBond, NetInfoNetwork},
    normalize::{BOOTPROTO_DHCP, BOOTPROTO_NONE},
    qos::remove_zero_values_in_net_qos,
    normalize, ErrorKind, HostNetError, NetAttrs, NetConfig, NetInfo,
};

// Attributes the kernel probe cannot report, ignored by the diff.
const NON_KERNEL_KEYS: [&str; 4] =
    ["nameservers", "custom", "hostQos", "remove"];

#[derive(Debug, Clone, Serialize)]
/// Networks and bonds as currently configured in the kernel, expressed in
/// the same vocabulary as the persisted configuration.
///
/// Built once from a [NetInfo] snapshot and never modified afterwards.
/// Comparison against a desired [NetConfig] normalizes both sides, so
/// `mtu: 1500` equals `mtu: "1500"` and slave order does not matter.
pub struct KernelConfig {
    #[serde(flatten)]
    config: NetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
/// Entities which differ between the kernel and a desired configuration.
pub struct ConfigDiff {
    /// Desired networks missing from the kernel.
    pub networks_missing: BTreeSet<String>,
    /// Kernel networks not in the desired configuration.
    pub networks_extra: BTreeSet<String>,
    /// Networks present on both sides with different attributes.
    pub networks_changed: BTreeSet<String>,
    pub bonds_missing: BTreeSet<String>,
    pub bonds_extra: BTreeSet<String>,
    pub bonds_changed: BTreeSet<String>,
}

impl ConfigDiff {
    pub fn is_empty(&self) -> bool {
        self.networks_missing.is_empty()
            && self.networks_extra.is_empty()
            && self.networks_changed.is_empty()
            && self.bonds_missing.is_empty()
            && self.bonds_extra.is_empty()
            && self.bonds_changed.is_empty()
    }

    /// Networks which need to be (re)applied to reach the desired state.
    pub fn networks_to_apply(&self) -> BTreeSet<&str> {
        self.networks_missing
            .iter()
            .chain(self.networks_changed.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn bonds_to_apply(&self) -> BTreeSet<&str> {
        self.bonds_missing
            .iter()
            .chain(self.bonds_changed.iter())
            .map(String::as_str)
            .collect()
    }
}

impl KernelConfig {
    pub fn new(netinfo: &NetInfo) -> Result<Self, HostNetError> {
        let mut config = NetConfig::new();
        for (net, net_attr) in netinfo.networks.iter() {
            config.networks.insert(
                net.to_string(),
                translate_netinfo_net(net, net_attr, netinfo)?,
            );
        }
        for (bond, bond_attr) in netinfo.bondings.iter() {
            config
                .bonds
                .insert(bond.to_string(), translate_netinfo_bond(bond_attr));
        }
        Ok(Self { config })
    }

    pub fn networks(&self) -> &BTreeMap<String, NetAttrs> {
        &self.config.networks
    }

    pub fn bonds(&self) -> &BTreeMap<String, NetAttrs> {
        &self.config.bonds
    }

    pub fn as_net_config(&self) -> &NetConfig {
        &self.config
    }

    /// Normalized comparison against the desired configuration.
    ///
    /// Attributes which cannot be read back from the kernel, such as
    /// nameservers, are not compared.
    pub fn diff(
        &self,
        desired: &NetConfig,
    ) -> Result<ConfigDiff, HostNetError> {
        let running = without_non_kernel_keys(normalize(&self.config)?);
        let desired = without_non_kernel_keys(normalize(desired)?);
        let mut ret = ConfigDiff::default();

        for (net, attrs) in desired.networks.iter() {
            match running.networks.get(net) {
                None => {
                    ret.networks_missing.insert(net.to_string());
                }
                Some(cur) if cur != attrs => {
                    log::debug!(
                        "Network {} differs, kernel {}, desired {}",
                        net,
                        Value::Object(cur.clone()),
                        Value::Object(attrs.clone())
                    );
                    ret.networks_changed.insert(net.to_string());
                }
                Some(_) => (),
            }
        }
        ret.networks_extra = running
            .networks
            .keys()
            .filter(|n| !desired.networks.contains_key(n.as_str()))
            .cloned()
            .collect();

        for (bond, attrs) in desired.bonds.iter() {
            match running.bonds.get(bond) {
                None => {
                    ret.bonds_missing.insert(bond.to_string());
                }
                Some(cur) if cur != attrs => {
                    log::debug!(
                        "Bond {} differs, kernel {}, desired {}",
                        bond,
                        Value::Object(cur.clone()),
                        Value::Object(attrs.clone())
                    );
                    ret.bonds_changed.insert(bond.to_string());
                }
                Some(_) => (),
            }
        }
        ret.bonds_extra = running
            .bonds
            .keys()
            .filter(|b| !desired.bonds.contains_key(b.as_str()))
            .cloned()
            .collect();
        Ok(ret)
    }

    /// Whether both configurations describe the same networks and bonds
    /// once normalized.
    pub fn equals(&self, other: &NetConfig) -> Result<bool, HostNetError> {
        if self.config == *other {
            return Ok(true);
        }
        let mine = normalize(&self.config)?;
        let other = normalize(other)?;
        Ok(mine.networks == other.networks && mine.bonds == other.bonds)
    }
}

/// Delegates to [KernelConfig::equals()]. Identical configurations are
/// always equal, otherwise a configuration which fails to normalize is
/// never equal to anything.
impl PartialEq<NetConfig> for KernelConfig {
    fn eq(&self, other: &NetConfig) -> bool {
        self.equals(other).unwrap_or_else(|e| {
            log::warn!("Cannot compare configurations: {}", e);
            false
        })
    }
}

impl PartialEq for KernelConfig {
    fn eq(&self, other: &Self) -> bool {
        *self == other.config
    }
}

fn without_non_kernel_keys(mut config: NetConfig) -> NetConfig {
    for net_attr in config.networks.values_mut() {
        net_attr.retain(|key, _| !NON_KERNEL_KEYS.contains(&key.as_str()));
    }
    config
}

fn translate_netinfo_net(
    net: &str,
    net_attr: &NetInfoNetwork,
    netinfo: &NetInfo,
) -> Result<NetAttrs, HostNetError> {
    let topology = netinfo.nics_vlan_and_bonding_for_network(net)?;
    let mut attributes = NetAttrs::new();
    translate_bridged(&mut attributes, net_attr);
    translate_mtu(&mut attributes, net_attr);
    if let Some(vlan_id) = topology.vlan_id {
        attributes
            .insert("vlan".to_string(), Value::String(vlan_id.to_string()));
    }
    if let Some(bond) = topology.bonding {
        attributes.insert("bonding".to_string(), Value::String(bond));
    } else if !topology.nics.is_empty() {
        translate_nics(&mut attributes, net, &topology.nics)?;
    }
    translate_ipaddr(&mut attributes, net_attr);
    translate_hostqos(&mut attributes, net_attr);
    Ok(attributes)
}

fn translate_bridged(attributes: &mut NetAttrs, net_attr: &NetInfoNetwork) {
    attributes.insert("bridged".to_string(), Value::Bool(net_attr.bridged));
    if net_attr.bridged {
        let stp = match net_attr.stp.as_deref().map(str::trim) {
            // 1 is kernel STP, 2 is user space STP
            Some("2") => true,
            Some(s) => stp_to_bool(Some(&Value::String(s.to_string()))),
            None => false,
        };
        attributes.insert("stp".to_string(), Value::Bool(stp));
    }
}

fn translate_mtu(attributes: &mut NetAttrs, net_attr: &NetInfoNetwork) {
    attributes.insert("mtu".to_string(), Value::String(net_attr.mtu.clone()));
}

fn translate_nics(
    attributes: &mut NetAttrs,
    net: &str,
    nics: &[String],
) -> Result<(), HostNetError> {
    match nics {
        [nic] => {
            attributes.insert("nic".to_string(), Value::String(nic.clone()));
            Ok(())
        }
        _ => Err(HostNetError::new(
            ErrorKind::Bug,
            format!(
                "Network {net} is attached to multiple nics {nics:?} \
                without bonding"
            ),
        )),
    }
}

fn translate_ipaddr(attributes: &mut NetAttrs, net_attr: &NetInfoNetwork) {
    let bootproto = if net_attr.dhcpv4 {
        BOOTPROTO_DHCP
    } else {
        BOOTPROTO_NONE
    };
    attributes.insert(
        "bootproto".to_string(),
        Value::String(bootproto.to_string()),
    );
    attributes.insert("dhcpv6".to_string(), Value::Bool(net_attr.dhcpv6));
    // TODO: DEFROUTE is configurator specific, look up the routing table
    // once NetInfo carries routes.
    let default_route =
        net_attr.cfg.get("DEFROUTE").map(String::as_str) == Some("yes");
    attributes
        .insert("defaultRoute".to_string(), Value::Bool(default_route));
    // Only static addresses are part of the configuration.
    if bootproto == BOOTPROTO_NONE {
        for (key, value) in [
            ("ipaddr", &net_attr.addr),
            ("netmask", &net_attr.netmask),
            ("gateway", &net_attr.gateway),
        ] {
            if !value.is_empty() {
                attributes
                    .insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }
    if !net_attr.dhcpv6 {
        let non_local_addresses: Vec<Value> = net_attr
            .ipv6addrs
            .iter()
            .filter(|addr| !is_link_local_cidr(addr))
            .map(|addr| Value::String(addr.clone()))
            .collect();
        if !non_local_addresses.is_empty() {
            attributes.insert(
                "ipv6addr".to_string(),
                Value::Array(non_local_addresses),
            );
        }
        if !is_unspecified_ipv6(&net_attr.ipv6gateway) {
            attributes.insert(
                "ipv6gateway".to_string(),
                Value::String(net_attr.ipv6gateway.clone()),
            );
        }
    }
}

fn translate_hostqos(attributes: &mut NetAttrs, net_attr: &NetInfoNetwork) {
    if let Some(qos) = net_attr.host_qos.as_ref() {
        if qos.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
            attributes.insert(
                "hostQos".to_string(),
                remove_zero_values_in_net_qos(qos),
            );
        }
    }
}

fn translate_netinfo_bond(bond_attr: &NetInfoBond) -> NetAttrs {
    let mut slaves = bond_attr.slaves.clone();
    slaves.sort();
    let mut attributes = NetAttrs::new();
    attributes.insert(
        "nics".to_string(),
        Value::Array(slaves.into_iter().map(Value::String).collect()),
    );
    attributes.insert(
        "options".to_string(),
        Value::String(bond_opts_to_string(&bond_attr.opts)),
    );
    attributes
}
