// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::str::FromStr;

use serde_json::Value;

use crate::{
    bond_opts::BondMode,
    canonize::is_remove,
    ip::{netmask_to_prefix, parse_ipv4, parse_ipv6_cidr, strip_zone_id},
    net_config::{to_bool, value_to_string},
    normalize::BOOTPROTO_DHCP,
    ErrorKind, HostNetError, KernelConfig, NetAttrs, NetConfig, NetInfo,
    SetupRequest,
};

const MAX_BRIDGE_NAME_LEN: usize = 15;
const ILLEGAL_BRIDGE_CHARS: [char; 4] = [':', '.', '\t', ' '];
const MAX_VLAN_ID: u64 = 4094;
const MAX_IPV4_PREFIX: u64 = 32;

/// Reject a canonized request before anything is changed on the host.
///
/// `running` is the configuration currently in effect and `netinfo` the
/// host inventory, an empty nic list means the inventory is unknown.
pub fn validate(
    request: &SetupRequest,
    running: &NetConfig,
    netinfo: &NetInfo,
) -> Result<(), HostNetError> {
    for (bond, bond_attr) in request.bondings.iter() {
        validate_bond(bond, bond_attr, running, netinfo)?;
    }
    for (net, net_attr) in request.networks.iter() {
        validate_network(net, net_attr, request, running, netinfo)?;
    }
    validate_default_route(request, running)?;
    validate_lower_device_usages(request, netinfo)?;
    Ok(())
}

fn config_error(msg: String) -> HostNetError {
    let e = HostNetError::new(ErrorKind::ConfigError, msg);
    log::error!("{}", e);
    e
}

fn validate_bond(
    bond: &str,
    bond_attr: &NetAttrs,
    running: &NetConfig,
    netinfo: &NetInfo,
) -> Result<(), HostNetError> {
    if !is_valid_bond_name(bond) {
        return Err(config_error(format!("Bad bonding name: {bond:?}")));
    }
    if is_remove(bond_attr) {
        if !running.bonds.contains_key(bond)
            && !netinfo.bondings.contains_key(bond)
        {
            return Err(config_error(format!(
                "Cannot remove bonding {bond}: does not exist"
            )));
        }
        return Ok(());
    }
    let nics = string_list(bond_attr.get("nics"));
    if nics.is_empty() {
        return Err(config_error(format!(
            "Bonding {bond} requires at least one nic"
        )));
    }
    for nic in nics.iter() {
        if !netinfo.nics.is_empty() && !netinfo.nics.contains_key(nic) {
            return Err(config_error(format!(
                "Unknown nic {nic} for bonding {bond}"
            )));
        }
    }
    if let Some(opts) = bond_attr.get("options") {
        validate_bond_options(bond, &value_to_string(opts))?;
    }
    Ok(())
}

fn is_valid_bond_name(name: &str) -> bool {
    name.strip_prefix("bond")
        .map(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

fn validate_bond_options(bond: &str, opts: &str) -> Result<(), HostNetError> {
    for token in opts.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            return Err(config_error(format!(
                "Bonding {bond}: invalid option {token:?}, expecting \
                key=value"
            )));
        };
        if key == "mode" && BondMode::from_name_or_id(value).is_none() {
            return Err(config_error(format!(
                "Bonding {bond}: unknown mode {value}"
            )));
        }
    }
    Ok(())
}

fn validate_network(
    net: &str,
    net_attr: &NetAttrs,
    request: &SetupRequest,
    running: &NetConfig,
    netinfo: &NetInfo,
) -> Result<(), HostNetError> {
    if is_remove(net_attr) {
        if net_attr.len() > 1 {
            return Err(config_error(format!(
                "Network {net}: cannot specify any attribute when removing"
            )));
        }
        if !running.networks.contains_key(net)
            && !netinfo.networks.contains_key(net)
        {
            return Err(config_error(format!(
                "Cannot delete network {net}: it does not exist"
            )));
        }
        return Ok(());
    }
    if net_attr.get("bridged").map(to_bool).unwrap_or(true) {
        validate_bridge_name(net)?;
    }
    if let Some(vlan) = net_attr.get("vlan") {
        if vlan.as_u64().map(|v| v > MAX_VLAN_ID).unwrap_or(true) {
            return Err(config_error(format!(
                "Network {net}: vlan id {vlan} out of range 0..={MAX_VLAN_ID}"
            )));
        }
    }
    validate_lower_device(net, net_attr, request, running, netinfo)?;
    validate_ipv4(net, net_attr)?;
    validate_ipv6(net, net_attr)?;
    for nameserver in string_list(net_attr.get("nameservers")) {
        IpAddr::from_str(strip_zone_id(&nameserver)).map_err(|e| {
            config_error(format!(
                "Network {net}: bad nameserver address {nameserver}: {e}"
            ))
        })?;
    }
    Ok(())
}

fn validate_bridge_name(name: &str) -> Result<(), HostNetError> {
    if name.is_empty()
        || name.len() > MAX_BRIDGE_NAME_LEN
        || name.contains(&ILLEGAL_BRIDGE_CHARS[..])
        || name.starts_with('-')
    {
        return Err(config_error(format!("Bridge name isn't valid: {name:?}")));
    }
    Ok(())
}

fn validate_lower_device(
    net: &str,
    net_attr: &NetAttrs,
    request: &SetupRequest,
    running: &NetConfig,
    netinfo: &NetInfo,
) -> Result<(), HostNetError> {
    let nic = net_attr.get("nic").map(value_to_string);
    let bonding = net_attr.get("bonding").map(value_to_string);
    match (nic, bonding) {
        (Some(_), Some(_)) => Err(config_error(format!(
            "Network {net}: both nic and bonding specified"
        ))),
        (None, None) => Err(config_error(format!(
            "Network {net}: either nic or bonding is required"
        ))),
        (Some(nic), None) => {
            if !netinfo.nics.is_empty() && !netinfo.nics.contains_key(&nic) {
                Err(config_error(format!("Network {net}: unknown nic {nic}")))
            } else {
                Ok(())
            }
        }
        (None, Some(bond)) => {
            let requested = request
                .bondings
                .get(&bond)
                .map(|attrs| !is_remove(attrs));
            let known = match requested {
                Some(requested) => requested,
                None => {
                    running.bonds.contains_key(&bond)
                        || netinfo.bondings.contains_key(&bond)
                }
            };
            if known {
                Ok(())
            } else {
                Err(config_error(format!(
                    "Network {net}: unknown bonding {bond}"
                )))
            }
        }
    }
}

// At most one network per (nic or bonding, vlan) once the request is
// merged into what the kernel already has.
fn validate_lower_device_usages(
    request: &SetupRequest,
    netinfo: &NetInfo,
) -> Result<(), HostNetError> {
    let mut networks =
        KernelConfig::new(netinfo)?.as_net_config().networks.clone();
    for (net, net_attr) in request.networks.iter() {
        if is_remove(net_attr) {
            networks.remove(net);
        } else {
            networks.insert(net.to_string(), net_attr.clone());
        }
    }

    let mut used: BTreeSet<(String, Option<String>)> = BTreeSet::new();
    for (net, net_attr) in networks.iter() {
        let Some(device) = net_attr
            .get("bonding")
            .or_else(|| net_attr.get("nic"))
            .map(value_to_string)
        else {
            continue;
        };
        let vlan = net_attr.get("vlan").map(value_to_string);
        if !used.insert((device.clone(), vlan.clone())) {
            return Err(config_error(format!(
                "Network {net}: multiple networks cannot be defined on \
                device {device} with vlan {}",
                vlan.as_deref().unwrap_or("none")
            )));
        }
    }
    Ok(())
}

fn validate_ipv4(net: &str, net_attr: &NetAttrs) -> Result<(), HostNetError> {
    let ipaddr = net_attr.get("ipaddr").map(value_to_string);
    let netmask = net_attr.get("netmask").map(value_to_string);
    let prefix = net_attr.get("prefix");
    let gateway = net_attr.get("gateway").map(value_to_string);

    match ipaddr.as_deref() {
        Some(addr) => {
            parse_ipv4(addr, "address")?;
            if netmask.is_none() && prefix.is_none() {
                return Err(config_error(format!(
                    "Network {net}: ipaddr requires netmask or prefix"
                )));
            }
            let bootproto = net_attr.get("bootproto").map(value_to_string);
            if bootproto.as_deref() == Some(BOOTPROTO_DHCP) {
                return Err(config_error(format!(
                    "Network {net}: static ipaddr and dhcp are exclusive"
                )));
            }
        }
        None => {
            if netmask.is_some() || prefix.is_some() || gateway.is_some() {
                return Err(config_error(format!(
                    "Network {net}: netmask, prefix or gateway requires \
                    ipaddr"
                )));
            }
        }
    }
    if let Some(netmask) = netmask.as_deref() {
        netmask_to_prefix(netmask)?;
    }
    if let Some(prefix) = prefix {
        let valid = match prefix {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .map(|p| p <= MAX_IPV4_PREFIX)
        .unwrap_or(false);
        if !valid {
            return Err(config_error(format!(
                "Network {net}: bad prefix {prefix}"
            )));
        }
    }
    if let Some(gateway) = gateway.as_deref() {
        parse_ipv4(gateway, "gateway")?;
    }
    Ok(())
}

fn validate_ipv6(net: &str, net_attr: &NetAttrs) -> Result<(), HostNetError> {
    for addr in string_list(net_attr.get("ipv6addr")) {
        parse_ipv6_cidr(&addr).map_err(|e| {
            config_error(format!("Network {net}: {}", e.msg()))
        })?;
    }
    if let Some(gateway) = net_attr.get("ipv6gateway").map(value_to_string) {
        std::net::Ipv6Addr::from_str(&gateway).map_err(|e| {
            config_error(format!(
                "Network {net}: bad IPv6 gateway {gateway:?}: {e}"
            ))
        })?;
    }
    Ok(())
}

// Only one network may own the default route once the request is merged
// into the running configuration. Nameservers follow the default route.
fn validate_default_route(
    request: &SetupRequest,
    running: &NetConfig,
) -> Result<(), HostNetError> {
    let mut default_route_nets: BTreeSet<&str> = running
        .networks
        .iter()
        .filter(|(_, attrs)| {
            attrs.get("defaultRoute").map(to_bool).unwrap_or(false)
        })
        .map(|(net, _)| net.as_str())
        .collect();
    for (net, net_attr) in request.networks.iter() {
        let default_route = !is_remove(net_attr)
            && net_attr.get("defaultRoute").map(to_bool).unwrap_or(false);
        if default_route {
            default_route_nets.insert(net.as_str());
        } else {
            default_route_nets.remove(net.as_str());
            if !string_list(net_attr.get("nameservers")).is_empty() {
                return Err(HostNetError::new(
                    ErrorKind::ValidationError,
                    format!(
                        "Network {net}: nameservers are only allowed on the \
                        default route network"
                    ),
                ));
            }
        }
    }
    if default_route_nets.len() > 1 {
        return Err(HostNetError::new(
            ErrorKind::ValidationError,
            format!(
                "Only a single default route network is allowed, got {}",
                default_route_nets
                    .iter()
                    .copied()
                    .collect::<Vec<&str>>()
                    .join(", ")
            ),
        ));
    }
    Ok(())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => {
            items.iter().map(value_to_string).collect()
        }
        Some(Value::String(s)) if !s.is_empty() => vec![s.to_string()],
        _ => Vec::new(),
    }
}
