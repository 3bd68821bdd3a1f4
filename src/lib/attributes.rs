// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde_json::Value;

use crate::{
    bond_opts::parse_bond_options,
    ip::{netmask_to_prefix, parse_ipv4},
    net_config::{to_bool, value_to_string},
    normalize::{BOOTPROTO_DHCP, DEFAULT_MTU},
    ErrorKind, HostNetError, NetAttrs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootProto {
    #[default]
    None,
    Dhcp,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
/// Typed view of one normalized network.
pub struct NetworkAttributes {
    pub bridged: bool,
    pub stp: Option<bool>,
    pub mtu: u64,
    pub vlan: Option<u16>,
    pub bonding: Option<String>,
    pub nic: Option<String>,
    pub bootproto: BootProto,
    pub dhcpv6: bool,
    pub ipaddr: Option<Ipv4Addr>,
    pub prefix: Option<u8>,
    pub gateway: Option<Ipv4Addr>,
    /// IPv6 CIDR strings in request order.
    pub ipv6addr: Vec<String>,
    pub ipv6gateway: Option<String>,
    pub default_route: bool,
    pub nameservers: Vec<String>,
    pub host_qos: Option<Value>,
}

impl NetworkAttributes {
    /// Device the network is built on: the nic or the bond.
    pub fn lower_device(&self) -> Option<&str> {
        self.bonding.as_deref().or(self.nic.as_deref())
    }

    /// Vlan device name, `<lower>.<vlan id>`.
    pub fn vlan_device(&self) -> Option<String> {
        match (self.lower_device(), self.vlan) {
            (Some(lower), Some(vlan)) => Some(format!("{lower}.{vlan}")),
            _ => None,
        }
    }

    /// Topmost non bridge device: the vlan device or the lower device.
    pub fn top_device(&self) -> Option<String> {
        self.vlan_device()
            .or_else(|| self.lower_device().map(str::to_string))
    }

    /// Device holding the IP configuration of `network`.
    pub fn ip_device(&self, network: &str) -> Option<String> {
        if self.bridged {
            Some(network.to_string())
        } else {
            self.top_device()
        }
    }
}

impl TryFrom<&NetAttrs> for NetworkAttributes {
    type Error = HostNetError;

    fn try_from(attrs: &NetAttrs) -> Result<Self, Self::Error> {
        let bridged = attrs.get("bridged").map(to_bool).unwrap_or(true);
        let ipaddr = match get_string(attrs, "ipaddr") {
            Some(addr) => Some(parse_ipv4(&addr, "address")?),
            None => None,
        };
        let prefix = match get_string(attrs, "netmask") {
            Some(netmask) => Some(netmask_to_prefix(&netmask)?),
            None => None,
        };
        let gateway = match get_string(attrs, "gateway") {
            Some(gw) => Some(parse_ipv4(&gw, "gateway")?),
            None => None,
        };
        Ok(Self {
            bridged,
            stp: if bridged {
                attrs.get("stp").map(to_bool)
            } else {
                None
            },
            mtu: match get_string(attrs, "mtu") {
                Some(mtu) => parse_number(&mtu, "mtu")?,
                None => DEFAULT_MTU,
            },
            vlan: match get_string(attrs, "vlan") {
                Some(vlan) => Some(parse_number(&vlan, "vlan")?),
                None => None,
            },
            bonding: get_string(attrs, "bonding"),
            nic: get_string(attrs, "nic"),
            bootproto: match get_string(attrs, "bootproto").as_deref() {
                Some(BOOTPROTO_DHCP) => BootProto::Dhcp,
                _ => BootProto::None,
            },
            dhcpv6: attrs.get("dhcpv6").map(to_bool).unwrap_or(false),
            ipaddr,
            prefix,
            gateway,
            ipv6addr: get_list(attrs, "ipv6addr"),
            ipv6gateway: get_string(attrs, "ipv6gateway"),
            default_route: attrs
                .get("defaultRoute")
                .map(to_bool)
                .unwrap_or(false),
            nameservers: get_list(attrs, "nameservers"),
            host_qos: attrs.get("hostQos").cloned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
/// Typed view of one normalized bond.
pub struct BondAttributes {
    pub nics: Vec<String>,
    pub options: BTreeMap<String, String>,
}

impl TryFrom<&NetAttrs> for BondAttributes {
    type Error = HostNetError;

    fn try_from(attrs: &NetAttrs) -> Result<Self, Self::Error> {
        let mut nics = get_list(attrs, "nics");
        nics.sort();
        Ok(Self {
            nics,
            options: get_string(attrs, "options")
                .map(|o| parse_bond_options(&o))
                .unwrap_or_default(),
        })
    }
}

fn get_string(attrs: &NetAttrs, key: &str) -> Option<String> {
    attrs
        .get(key)
        .filter(|v| !v.is_null())
        .map(value_to_string)
        .filter(|s| !s.is_empty())
}

fn get_list(attrs: &NetAttrs, key: &str) -> Vec<String> {
    match attrs.get(key) {
        Some(Value::Array(items)) => {
            items.iter().map(value_to_string).collect()
        }
        Some(Value::String(s)) if !s.is_empty() => vec![s.to_string()],
        _ => Vec::new(),
    }
}

fn parse_number<T: FromStr>(
    value: &str,
    desc: &str,
) -> Result<T, HostNetError> {
    value.trim().parse::<T>().map_err(|_| {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Invalid {desc} {value:?}"),
        )
    })
}
