// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use crate::{
    net_config::{parse_stp, to_bool, value_to_string},
    normalize::DEFAULT_MTU,
    ErrorKind, HostNetError, NetAttrs, SetupRequest,
};

/// Bring a request into its canonical form: flags become booleans, MTU and
/// vlan id become integers and defaults are filled in.
///
/// Networks marked for removal only get their `remove` flag canonized.
pub fn canonize_request(
    request: &mut SetupRequest,
) -> Result<(), HostNetError> {
    for (net, net_attr) in request.networks.iter_mut() {
        canonize_network(net_attr).map_err(|e| {
            HostNetError::new(e.kind(), format!("Network {net}: {}", e.msg()))
        })?;
    }
    for bond_attr in request.bondings.values_mut() {
        canonize_remove(bond_attr);
    }
    Ok(())
}

fn canonize_network(net_attr: &mut NetAttrs) -> Result<(), HostNetError> {
    if canonize_remove(net_attr) {
        return Ok(());
    }
    canonize_mtu(net_attr)?;
    canonize_vlan(net_attr)?;
    canonize_bridged(net_attr)?;
    let default_route =
        net_attr.get("defaultRoute").map(to_bool).unwrap_or(false);
    net_attr.insert("defaultRoute".to_string(), Value::Bool(default_route));
    if !net_attr.contains_key("nameservers") {
        net_attr.insert("nameservers".to_string(), Value::Array(Vec::new()));
    }
    Ok(())
}

pub(crate) fn is_remove(attrs: &NetAttrs) -> bool {
    attrs.get("remove").map(to_bool).unwrap_or(false)
}

fn canonize_remove(attrs: &mut NetAttrs) -> bool {
    let remove = is_remove(attrs);
    if attrs.contains_key("remove") {
        attrs.insert("remove".to_string(), Value::Bool(remove));
    }
    remove
}

fn canonize_mtu(net_attr: &mut NetAttrs) -> Result<(), HostNetError> {
    let mtu = match net_attr.get("mtu") {
        Some(v) => parse_integer(v, "mtu")?,
        None => DEFAULT_MTU,
    };
    net_attr.insert("mtu".to_string(), Value::from(mtu));
    Ok(())
}

fn canonize_vlan(net_attr: &mut NetAttrs) -> Result<(), HostNetError> {
    match net_attr.get("vlan") {
        None => (),
        Some(v) if v.is_null() || value_to_string(v).trim().is_empty() => {
            net_attr.remove("vlan");
        }
        Some(v) => {
            let vlan = parse_integer(v, "vlan")?;
            net_attr.insert("vlan".to_string(), Value::from(vlan));
        }
    }
    Ok(())
}

// New bridges get STP disabled unless requested.
fn canonize_bridged(net_attr: &mut NetAttrs) -> Result<(), HostNetError> {
    let bridged = net_attr.get("bridged").map(to_bool).unwrap_or(true);
    net_attr.insert("bridged".to_string(), Value::Bool(bridged));
    let stp = match (net_attr.remove("stp"), net_attr.remove("STP")) {
        (Some(stp), _) => Some(stp),
        (None, stp) => stp,
    };
    if bridged {
        let stp = match stp {
            Some(v) => parse_stp(&v).ok_or_else(|| {
                HostNetError::new(
                    ErrorKind::ConfigError,
                    format!("Invalid stp value {v}"),
                )
            })?,
            None => false,
        };
        net_attr.insert("stp".to_string(), Value::Bool(stp));
    }
    Ok(())
}

fn parse_integer(value: &Value, desc: &str) -> Result<u64, HostNetError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Invalid {desc} {value}"),
        )
    })
}
