// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    attributes::NetworkAttributes,
    bond::BondDriver,
    bond_opts::running_bond_options,
    ip::{is_ipv6_unicast_link_local, prefix_to_netmask},
    netinfo::{
        NetInfoBond, NetInfoBridge, NetInfoNetwork, NetInfoNic, NetInfoVlan,
    },
    nispor::error::np_error_to_hostnet,
    sysfs::SysfsNet,
    HostNetError, NetConfig, NetInfo, NetInfoProbe,
};

const IPV4_DEFAULT_GATEWAY: &str = "0.0.0.0/0";
const IPV6_DEFAULT_GATEWAY: &str = "::/0";
const MAIN_ROUTE_TABLE: u32 = 254;
const STATIC_LIFETIME: &str = "forever";

/// Kernel read model through netlink, bonding and bridge details through
/// sysfs.
#[derive(Debug, Clone, Default)]
pub struct NisporProbe {
    sysfs: SysfsNet,
}

impl NisporProbe {
    pub fn new(sysfs: SysfsNet) -> Self {
        Self { sysfs }
    }
}

impl NetInfoProbe for NisporProbe {
    fn probe(&self, running: &NetConfig) -> Result<NetInfo, HostNetError> {
        nispor_retrieve(&self.sysfs, running)
    }
}

pub(crate) fn nispor_retrieve(
    sysfs: &SysfsNet,
    running: &NetConfig,
) -> Result<NetInfo, HostNetError> {
    let np_state = nispor::NetState::retrieve().map_err(np_error_to_hostnet)?;
    let mut netinfo = NetInfo::new();

    for np_iface in np_state.ifaces.values() {
        let name = np_iface.name.to_string();
        let mtu = np_iface.mtu.to_string();
        match &np_iface.iface_type {
            nispor::IfaceType::Ethernet | nispor::IfaceType::Veth => {
                netinfo.nics.insert(
                    name,
                    NetInfoNic {
                        hwaddr: np_iface.mac_address.to_string(),
                        mtu,
                    },
                );
            }
            nispor::IfaceType::Bond => {
                let bond = np_bond_to_netinfo(sysfs, np_iface)?;
                netinfo.bondings.insert(name, bond);
            }
            nispor::IfaceType::Vlan => {
                if let Some(np_vlan) = np_iface.vlan.as_ref() {
                    netinfo.vlans.insert(
                        name,
                        NetInfoVlan {
                            iface: np_vlan.base_iface.to_string(),
                            vlanid: np_vlan.vlan_id,
                            mtu,
                        },
                    );
                }
            }
            nispor::IfaceType::Bridge => {
                netinfo.bridges.insert(
                    name.clone(),
                    NetInfoBridge {
                        ports: np_iface
                            .bridge
                            .as_ref()
                            .map(|b| b.ports.clone())
                            .unwrap_or_default(),
                        stp: sysfs.bridge_stp_state(&name),
                        mtu,
                    },
                );
            }
            t => {
                debug!("Ignoring interface {} of type {:?}", name, t);
            }
        }
    }

    for (net, net_attr) in running.networks.iter() {
        let attrs = match NetworkAttributes::try_from(net_attr) {
            Ok(a) => a,
            Err(e) => {
                warn!("Ignoring network {} with bad configuration: {}", net, e);
                continue;
            }
        };
        let Some(iface) = attrs.ip_device(net) else {
            continue;
        };
        match np_state.ifaces.get(&iface) {
            Some(np_iface) => {
                let net_info =
                    np_network_to_netinfo(np_iface, &np_state.routes, &netinfo);
                debug!("Got network {} {:?}", net, net_info);
                netinfo.networks.insert(net.to_string(), net_info);
            }
            None => {
                debug!("Network {} device {} not found", net, iface);
            }
        }
    }
    Ok(netinfo)
}

fn np_bond_to_netinfo(
    sysfs: &SysfsNet,
    np_iface: &nispor::Iface,
) -> Result<NetInfoBond, HostNetError> {
    let name = np_iface.name.as_str();
    Ok(NetInfoBond {
        hwaddr: np_iface.mac_address.to_string(),
        slaves: sysfs.slaves(name)?.into_iter().collect(),
        active_slave: sysfs.active_slave(name).unwrap_or_default(),
        opts: running_bond_options(&sysfs.options(name)?)?,
        mtu: np_iface.mtu.to_string(),
    })
}

fn np_network_to_netinfo(
    np_iface: &nispor::Iface,
    np_routes: &[nispor::Route],
    netinfo: &NetInfo,
) -> NetInfoNetwork {
    let iface = np_iface.name.as_str();
    let mut net_info = NetInfoNetwork {
        iface: iface.to_string(),
        mtu: np_iface.mtu.to_string(),
        ..Default::default()
    };
    if let Some(bridge) = netinfo.bridges.get(iface) {
        net_info.bridged = true;
        net_info.ports = bridge.ports.clone();
        net_info.stp = bridge.stp.clone();
    }

    if let Some(np_ip) = np_iface.ipv4.as_ref() {
        for np_addr in np_ip.addresses.iter() {
            let cidr = format!("{}/{}", np_addr.address, np_addr.prefix_len);
            if np_addr.valid_lft != STATIC_LIFETIME {
                net_info.dhcpv4 = true;
            } else if net_info.addr.is_empty() {
                net_info.addr = np_addr.address.to_string();
                match prefix_to_netmask(np_addr.prefix_len) {
                    Ok(mask) => net_info.netmask = mask.to_string(),
                    Err(e) => warn!("{}", e),
                }
            }
            net_info.ipv4addrs.push(cidr);
        }
    }
    if let Some(np_ip) = np_iface.ipv6.as_ref() {
        for np_addr in np_ip.addresses.iter() {
            let is_link_local = np_addr
                .address
                .parse::<std::net::Ipv6Addr>()
                .map(|ip| is_ipv6_unicast_link_local(&ip))
                .unwrap_or(false);
            if np_addr.valid_lft != STATIC_LIFETIME && !is_link_local {
                net_info.dhcpv6 = true;
            }
            net_info
                .ipv6addrs
                .push(format!("{}/{}", np_addr.address, np_addr.prefix_len));
        }
    }

    let mut cfg = HashMap::new();
    let mut default_route = false;
    for np_route in np_routes.iter().filter(|r| {
        r.table == MAIN_ROUTE_TABLE && r.oif.as_deref() == Some(iface)
    }) {
        let gateway = np_route.gateway.clone().unwrap_or_default();
        match np_route.address_family {
            nispor::AddressFamily::IPv4 if is_default(np_route, true) => {
                default_route = true;
                net_info.gateway = gateway;
            }
            nispor::AddressFamily::IPv6 if is_default(np_route, false) => {
                net_info.ipv6gateway = gateway;
            }
            _ => (),
        }
    }
    cfg.insert(
        "DEFROUTE".to_string(),
        if default_route { "yes" } else { "no" }.to_string(),
    );
    net_info.cfg = cfg;
    net_info
}

fn is_default(np_route: &nispor::Route, ipv4: bool) -> bool {
    let default_dst = if ipv4 {
        IPV4_DEFAULT_GATEWAY
    } else {
        IPV6_DEFAULT_GATEWAY
    };
    match np_route.dst.as_deref() {
        None => true,
        Some(dst) => dst == default_dst,
    }
}
