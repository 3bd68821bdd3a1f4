// SPDX-License-Identifier: Apache-2.0

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::{ErrorKind, HostNetError};

const IPV4_ADDR_LEN: u8 = 32;
const IPV6_ADDR_LEN: u8 = 128;

// Copy from Rust official std::net::Ipv6Addr::is_unicast_link_local() which
// is experimental.
pub(crate) fn is_ipv6_unicast_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Dotted-decimal netmask of a CIDR prefix length, `24` -> `255.255.255.0`.
pub fn prefix_to_netmask(prefix: u8) -> Result<Ipv4Addr, HostNetError> {
    if prefix > IPV4_ADDR_LEN {
        return Err(HostNetError::new(
            ErrorKind::ConfigError,
            format!(
                "Invalid IPv4 prefix length {prefix}, should be in \
                range of 0..={IPV4_ADDR_LEN}"
            ),
        ));
    }
    let mask = if prefix == 0 {
        0u32
    } else {
        u32::MAX << (IPV4_ADDR_LEN - prefix)
    };
    Ok(Ipv4Addr::from(mask))
}

/// Prefix length of a contiguous netmask, `255.255.255.0` -> `24`.
pub fn netmask_to_prefix(netmask: &str) -> Result<u8, HostNetError> {
    let mask = u32::from(parse_ipv4(netmask, "netmask")?);
    if mask.leading_ones() + mask.trailing_zeros() != IPV4_ADDR_LEN as u32 {
        return Err(HostNetError::new(
            ErrorKind::ConfigError,
            format!("Bad netmask: {netmask:?}"),
        ));
    }
    Ok(mask.leading_ones() as u8)
}

pub(crate) fn parse_ipv4(
    addr: &str,
    desc: &str,
) -> Result<Ipv4Addr, HostNetError> {
    Ipv4Addr::from_str(addr).map_err(|e| {
        let e = HostNetError::new(
            ErrorKind::ConfigError,
            format!("Bad {desc}: {addr:?}: {e}"),
        );
        log::error!("{}", e);
        e
    })
}

/// Parse `2001:db8::1/64` (the prefix is optional and defaults to 128).
pub(crate) fn parse_ipv6_cidr(
    value: &str,
) -> Result<(Ipv6Addr, u8), HostNetError> {
    let (addr, prefix) = match value.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (value, None),
    };
    let ip = Ipv6Addr::from_str(addr).map_err(|e| {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Bad IPv6 address {value:?}: {e}"),
        )
    })?;
    let prefix_len = match prefix {
        Some(p) => p
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= IPV6_ADDR_LEN)
            .ok_or_else(|| {
                HostNetError::new(
                    ErrorKind::ConfigError,
                    format!(
                        "Invalid IPv6 prefix length {p:?} in {value:?}, \
                        should be in range of 0..={IPV6_ADDR_LEN}"
                    ),
                )
            })?,
        None => IPV6_ADDR_LEN,
    };
    Ok((ip, prefix_len))
}

/// Whether `addr[/prefix]` is an IPv6 link local address. Unparsable
/// addresses are not link local.
pub(crate) fn is_link_local_cidr(value: &str) -> bool {
    let addr = value.split('/').next().unwrap_or_default();
    Ipv6Addr::from_str(addr)
        .map(|ip| is_ipv6_unicast_link_local(&ip))
        .unwrap_or(false)
}

/// Unspecified gateway as reported for interfaces without IPv6 gateway.
pub(crate) fn is_unspecified_ipv6(addr: &str) -> bool {
    addr.is_empty()
        || Ipv6Addr::from_str(addr)
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false)
}

/// Strip the zone identifier of `fe80::1%eth0` style addresses (RFC 6874).
pub(crate) fn strip_zone_id(addr: &str) -> &str {
    addr.split('%').next().unwrap_or(addr)
}
