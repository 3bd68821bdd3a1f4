// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use crate::{
    bond_opts::normalize_bond_options,
    ip::prefix_to_netmask,
    net_config::{stp_to_bool, to_bool, value_to_string},
    qos::remove_zero_values_in_net_qos,
    ErrorKind, HostNetError, NetConfig,
};

pub const DEFAULT_MTU: u64 = 1500;

pub(crate) const BOOTPROTO_NONE: &str = "none";
pub(crate) const BOOTPROTO_DHCP: &str = "dhcp";

/// Canonical form of a configuration: defaults filled in, legacy keys
/// removed and values coerced so that structural equality means semantic
/// equality.
///
/// The input is left untouched. The steps are order dependent, later steps
/// rely on defaults injected by earlier ones.
pub fn normalize(config: &NetConfig) -> Result<NetConfig, HostNetError> {
    let mut config = config.clone();

    normalize_bridge(&mut config);
    normalize_vlan(&mut config);
    normalize_mtu(&mut config);
    normalize_blockingdhcp(&mut config);
    normalize_dhcp(&mut config);
    normalize_bonding_opts(&mut config)?;
    normalize_bonding_nics(&mut config);
    normalize_address(&mut config)?;
    normalize_host_qos(&mut config);
    normalize_ifcfg_keys(&mut config);

    Ok(config)
}

fn normalize_bridge(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        let bridged = net_attr.get("bridged").map(to_bool).unwrap_or(true);
        net_attr.insert("bridged".to_string(), Value::Bool(bridged));
        let stp = match (net_attr.remove("stp"), net_attr.remove("STP")) {
            (Some(stp), _) => Some(stp),
            (None, stp) => stp,
        };
        if bridged {
            net_attr.insert(
                "stp".to_string(),
                Value::Bool(stp_to_bool(stp.as_ref())),
            );
        }
    }
}

fn normalize_vlan(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        if let Some(vlan) = net_attr.get_mut("vlan") {
            *vlan = Value::String(value_to_string(vlan));
        }
    }
}

fn normalize_mtu(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        let mtu = match net_attr.get("mtu") {
            Some(mtu) => value_to_string(mtu),
            None => DEFAULT_MTU.to_string(),
        };
        net_attr.insert("mtu".to_string(), Value::String(mtu));
    }
}

fn normalize_blockingdhcp(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        net_attr.remove("blockingdhcp");
    }
}

fn normalize_dhcp(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        if net_attr.get("bootproto").map(Value::is_null).unwrap_or(true) {
            net_attr.insert(
                "bootproto".to_string(),
                Value::String(BOOTPROTO_NONE.to_string()),
            );
        }
        let dhcpv6 = net_attr.get("dhcpv6").map(to_bool).unwrap_or(false);
        net_attr.insert("dhcpv6".to_string(), Value::Bool(dhcpv6));
    }
}

fn normalize_bonding_opts(
    config: &mut NetConfig,
) -> Result<(), HostNetError> {
    for (bond, bond_attr) in config.bonds.iter_mut() {
        let opts = bond_attr.get("options").map(value_to_string);
        let normalized = normalize_bond_options(opts.as_deref())
            .map_err(|e| {
                HostNetError::new(
                    e.kind(),
                    format!("Bond {bond}: {}", e.msg()),
                )
            })?;
        bond_attr.insert("options".to_string(), Value::String(normalized));
    }
    // Bonding options used to live in the network attributes.
    for net_attr in config.networks.values_mut() {
        net_attr.remove("bondingOptions");
    }
    Ok(())
}

fn normalize_bonding_nics(config: &mut NetConfig) {
    for bond_attr in config.bonds.values_mut() {
        if let Some(Value::Array(nics)) = bond_attr.get_mut("nics") {
            nics.sort_by_key(value_to_string);
        }
    }
}

fn normalize_address(config: &mut NetConfig) -> Result<(), HostNetError> {
    for (net, net_attr) in config.networks.iter_mut() {
        if let Some(prefix) = net_attr.remove("prefix") {
            let prefix = parse_prefix(&prefix).map_err(|e| {
                HostNetError::new(
                    e.kind(),
                    format!("Network {net}: {}", e.msg()),
                )
            })?;
            net_attr.insert(
                "netmask".to_string(),
                Value::String(prefix_to_netmask(prefix)?.to_string()),
            );
        }
        if let Some(Value::String(addr)) = net_attr.get("ipv6addr").cloned() {
            net_attr.insert(
                "ipv6addr".to_string(),
                Value::Array(vec![Value::String(addr)]),
            );
        }
        let default_route =
            net_attr.get("defaultRoute").map(to_bool).unwrap_or(false);
        net_attr
            .insert("defaultRoute".to_string(), Value::Bool(default_route));
    }
    Ok(())
}

fn parse_prefix(prefix: &Value) -> Result<u8, HostNetError> {
    let parsed = match prefix {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Invalid prefix {prefix}"),
        )
    })
}

fn normalize_host_qos(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        if let Some(qos) = net_attr.get_mut("hostQos") {
            *qos = remove_zero_values_in_net_qos(qos);
        }
    }
}

// Raw ifcfg style keys (`IPV6_AUTOCONF`, `NM_CONTROLLED`) might be persisted
// by old management layers, they are never reported by the kernel.
fn normalize_ifcfg_keys(config: &mut NetConfig) {
    for net_attr in config.networks.values_mut() {
        net_attr.retain(|key, _| !is_ifcfg_key(key));
    }
}

pub(crate) fn is_ifcfg_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
