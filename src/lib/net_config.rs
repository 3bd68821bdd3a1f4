// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attributes of a single network or bond as supplied by the management
/// layer or read back from the persistence store.
///
/// The values are kept loosely typed on purpose: `mtu: 1500` and
/// `mtu: "1500"` are both valid input and only become identical after
/// [crate::normalize].
pub type NetAttrs = serde_json::Map<String, Value>;

// Keys which are meaningful during a single request only.
const NON_PERSISTENT_KEYS: [&str; 4] =
    ["configurator", "_netinfo", "force", "implicitBonding"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
/// Networks and bonds of a host, keyed by name.
///
/// Example in YAML:
/// ```yml
/// networks:
///   ovirtmgmt:
///     bonding: bond0
///     bridged: true
///     bootproto: dhcp
///     defaultRoute: true
/// bonds:
///   bond0:
///     nics:
///     - eth1
///     - eth0
///     options: mode=active-backup miimon=150
/// ```
pub struct NetConfig {
    #[serde(default)]
    pub networks: BTreeMap<String, NetAttrs>,
    #[serde(default)]
    pub bonds: BTreeMap<String, NetAttrs>,
}

impl NetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_network(&mut self, network: &str, attributes: &NetAttrs) {
        let clean_attrs: NetAttrs = attributes
            .iter()
            .filter(|(k, v)| {
                !v.is_null() && !NON_PERSISTENT_KEYS.contains(&k.as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        log::info!(
            "Adding network {}({})",
            network,
            Value::Object(clean_attrs.clone())
        );
        self.networks.insert(network.to_string(), clean_attrs);
    }

    pub fn remove_network(&mut self, network: &str) {
        if self.networks.remove(network).is_some() {
            log::info!("Removing network {}", network);
        } else {
            log::debug!("Network {} not found for removal", network);
        }
    }

    pub fn set_bonding(&mut self, bonding: &str, attributes: &NetAttrs) {
        log::info!(
            "Adding {}({})",
            bonding,
            Value::Object(attributes.clone())
        );
        self.bonds.insert(bonding.to_string(), attributes.clone());
    }

    pub fn remove_bonding(&mut self, bonding: &str) {
        if self.bonds.remove(bonding).is_some() {
            log::info!("Removing {}", bonding);
        } else {
            log::debug!("{} not found for removal", bonding);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.bonds.is_empty()
    }
}

/// Permissive boolean coercion used for most flags: JSON booleans as is,
/// `"true"` in any case, any non-zero integer (or integer string).
/// Everything else, `null` included, is false.
pub(crate) fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") {
                true
            } else {
                s.trim().parse::<i64>().map(|i| i != 0).unwrap_or(false)
            }
        }
        _ => false,
    }
}

/// Boolean coercion of bridge STP values. Absent value means STP on.
pub(crate) fn stp_to_bool(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            ["true", "yes", "on", "1"].contains(&s.as_str())
        }
        Some(_) => false,
    }
}

/// Strict variant of [stp_to_bool] used on requests: unknown strings are
/// rejected instead of being read as false.
pub(crate) fn parse_stp(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String form of a scalar value: numbers are rendered without quotes.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        v => v.to_string(),
    }
}
