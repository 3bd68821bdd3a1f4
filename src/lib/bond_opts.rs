// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::{ErrorKind, HostNetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum BondMode {
    /// `balance-rr`, numeric mode 0.
    RoundRobin,
    /// `active-backup`, numeric mode 1.
    ActiveBackup,
    /// `balance-xor`, numeric mode 2.
    XOR,
    /// `broadcast`, numeric mode 3.
    Broadcast,
    /// `802.3ad`, numeric mode 4.
    LACP,
    /// `balance-tlb`, numeric mode 5.
    TLB,
    /// `balance-alb`, numeric mode 6.
    ALB,
}

// Bidirectional name <-> numeric id table. The kernel reports symbolic
// options in sysfs as `<name> <id>`, e.g. `active-backup 1`.
const BOND_MODES: [(BondMode, &str, &str); 7] = [
    (BondMode::RoundRobin, "balance-rr", "0"),
    (BondMode::ActiveBackup, "active-backup", "1"),
    (BondMode::XOR, "balance-xor", "2"),
    (BondMode::Broadcast, "broadcast", "3"),
    (BondMode::LACP, "802.3ad", "4"),
    (BondMode::TLB, "balance-tlb", "5"),
    (BondMode::ALB, "balance-alb", "6"),
];

impl Default for BondMode {
    fn default() -> Self {
        Self::RoundRobin
    }
}

impl BondMode {
    /// Resolve either the symbolic name (`802.3ad`) or the numeric id
    /// (`4`).
    pub fn from_name_or_id(value: &str) -> Option<Self> {
        BOND_MODES
            .iter()
            .find(|(_, name, id)| *name == value || *id == value)
            .map(|(mode, _, _)| *mode)
    }

    pub fn id(&self) -> &'static str {
        BOND_MODES
            .iter()
            .find(|(mode, _, _)| mode == self)
            .map(|(_, _, id)| *id)
            .unwrap_or("0")
    }

    pub fn name(&self) -> &'static str {
        BOND_MODES
            .iter()
            .find(|(mode, _, _)| mode == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("balance-rr")
    }
}

impl std::fmt::Display for BondMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// sysfs entries under `bonding/` which are state or membership rather than
/// options.
pub(crate) const EXCLUDED_BONDING_ENTRIES: [&str; 10] = [
    "slaves",
    "active_slave",
    "mii_status",
    "queue_id",
    "ad_aggregator",
    "ad_num_ports",
    "ad_actor_key",
    "ad_partner_key",
    "ad_partner_mac",
    "ad_actor_system",
];

// Kernel defaults of a freshly created bond, numeric form.
const COMMON_DEFAULT_OPTIONS: [(&str, &str); 26] = [
    ("ad_actor_sys_prio", "65535"),
    ("ad_select", "0"),
    ("ad_user_port_key", "0"),
    ("all_slaves_active", "0"),
    ("arp_all_targets", "0"),
    ("arp_interval", "0"),
    ("arp_missed_max", "2"),
    ("arp_validate", "0"),
    ("coupled_control", "1"),
    ("downdelay", "0"),
    ("fail_over_mac", "0"),
    ("lacp_active", "1"),
    ("lacp_rate", "0"),
    ("lp_interval", "1"),
    ("miimon", "100"),
    ("min_links", "0"),
    ("num_grat_arp", "1"),
    ("num_unsol_na", "1"),
    ("packets_per_slave", "1"),
    ("peer_notif_delay", "0"),
    ("primary_reselect", "0"),
    ("resend_igmp", "1"),
    ("tlb_dynamic_lb", "1"),
    ("updelay", "0"),
    ("use_carrier", "1"),
    ("xmit_hash_policy", "0"),
];

// Symbolic values of enumerated options, mapped to the numeric value the
// kernel shows last in sysfs.
const SYMBOLIC_OPTION_VALUES: [(&str, &[(&str, &str)]); 8] = [
    ("ad_select", &[("stable", "0"), ("bandwidth", "1"), ("count", "2")]),
    ("arp_all_targets", &[("any", "0"), ("all", "1")]),
    (
        "arp_validate",
        &[
            ("none", "0"),
            ("active", "1"),
            ("backup", "2"),
            ("all", "3"),
            ("filter", "4"),
            ("filter_active", "5"),
            ("filter_backup", "6"),
        ],
    ),
    ("fail_over_mac", &[("none", "0"), ("active", "1"), ("follow", "2")]),
    ("lacp_active", &[("off", "0"), ("on", "1")]),
    ("lacp_rate", &[("slow", "0"), ("fast", "1")]),
    (
        "primary_reselect",
        &[("always", "0"), ("better", "1"), ("failure", "2")],
    ),
    (
        "xmit_hash_policy",
        &[
            ("layer2", "0"),
            ("layer3+4", "1"),
            ("layer2+3", "2"),
            ("encap2+3", "3"),
            ("encap3+4", "4"),
            ("vlan+srcmac", "5"),
        ],
    ),
];

const OPTION_CUSTOM: &str = "custom";
const OPTION_MODE: &str = "mode";

/// Default options of the given mode.
///
/// Only the default mode itself is listed as a default `mode` value, so
/// `mode=1` survives stripping while `mode=0` does not.
pub fn default_bond_options(
    mode: BondMode,
) -> BTreeMap<&'static str, &'static str> {
    let mut ret: BTreeMap<&'static str, &'static str> =
        COMMON_DEFAULT_OPTIONS.iter().copied().collect();
    if mode == BondMode::default() {
        ret.insert(OPTION_MODE, mode.id());
    }
    ret
}

/// Split `mode=4 miimon=100` into a mapping. Tokens without `=` are dropped.
pub fn parse_bond_options(opts: &str) -> BTreeMap<String, String> {
    let mut ret = BTreeMap::new();
    for token in opts.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            ret.insert(key.to_string(), value.to_string());
        } else {
            log::warn!("Ignoring malformed bond option {token:?}");
        }
    }
    ret
}

/// Render options as sorted `key=value` pairs joined by a single space.
pub fn bond_opts_to_string(opts: &BTreeMap<String, String>) -> String {
    opts.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<String>>()
        .join(" ")
}

fn numeric_option_value(key: &str, value: &str) -> String {
    SYMBOLIC_OPTION_VALUES
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, values)| {
            values.iter().find(|(name, _)| *name == value)
        })
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Force a numeric mode and drop every option equal to the default of that
/// mode.
pub fn strip_default_bond_options(
    mut opts: BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, HostNetError> {
    let mode = match opts.get(OPTION_MODE) {
        Some(m) => BondMode::from_name_or_id(m).ok_or_else(|| {
            HostNetError::new(
                ErrorKind::ConfigError,
                format!("Unknown bonding mode {m}"),
            )
        })?,
        None => BondMode::default(),
    };
    if opts.contains_key(OPTION_MODE) {
        opts.insert(OPTION_MODE.to_string(), mode.id().to_string());
    }
    let defaults = default_bond_options(mode);
    Ok(opts
        .into_iter()
        .map(|(k, v)| {
            let v = numeric_option_value(&k, &v);
            (k, v)
        })
        .filter(|(k, v)| defaults.get(k.as_str()) != Some(&v.as_str()))
        .collect())
}

/// Canonical form of a requested bond option string.
pub fn normalize_bond_options(
    opts: Option<&str>,
) -> Result<String, HostNetError> {
    let mut parsed = parse_bond_options(opts.unwrap_or_default());
    parsed.remove(OPTION_CUSTOM);
    Ok(bond_opts_to_string(&strip_default_bond_options(parsed)?))
}

/// Reduce options read from sysfs (`{"mode": ["active-backup", "1"]}`) to
/// their non-default, non-empty numeric values.
pub(crate) fn running_bond_options(
    raw: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<String, String>, HostNetError> {
    let opts: BTreeMap<String, String> = raw
        .iter()
        .filter(|(k, _)| !EXCLUDED_BONDING_ENTRIES.contains(&k.as_str()))
        .filter_map(|(k, v)| v.last().map(|last| (k.clone(), last.clone())))
        .filter(|(_, v)| !v.is_empty())
        .collect();
    strip_default_bond_options(opts)
}
