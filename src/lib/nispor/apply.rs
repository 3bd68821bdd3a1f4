// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::{
    attributes::{BootProto, NetworkAttributes},
    conf::DhcpSection,
    ip::parse_ipv6_cidr,
    link::LinkOps,
    nispor::error::np_error_to_hostnet,
    reaper::ChildReaper,
    sysfs::SysfsNet,
    ErrorKind, HostNetError, NetAttrs, NetworkConfigurator,
};

/// Networks as bridges, vlans and addresses through netlink. MTU and STP
/// go through sysfs, gateways through `ip route`.
#[derive(Debug)]
pub struct NisporConfigurator {
    sysfs: SysfsNet,
    dhcp: DhcpSection,
    reaper: Arc<ChildReaper>,
}

impl NisporConfigurator {
    pub fn new(
        sysfs: SysfsNet,
        dhcp: DhcpSection,
        reaper: Arc<ChildReaper>,
    ) -> Self {
        Self {
            sysfs,
            dhcp,
            reaper,
        }
    }
}

impl NetworkConfigurator for NisporConfigurator {
    fn add_network(
        &mut self,
        network: &str,
        net_attr: &NetAttrs,
    ) -> Result<(), HostNetError> {
        let attrs = NetworkAttributes::try_from(net_attr)?;
        let (lower, top, ip_iface) = devices(network, &attrs)?;
        log::info!("Adding network {} on {}", network, top);

        let mut np_ifaces = vec![{
            let mut np_iface = nispor::IfaceConf::default();
            np_iface.name = lower.clone();
            np_iface.iface_type = Some(lower_iface_type(&attrs));
            np_iface.state = nispor::IfaceState::Up;
            np_iface
        }];
        if let (Some(vlan_id), Some(vlan_iface)) =
            (attrs.vlan, attrs.vlan_device())
        {
            np_ifaces.push({
                let mut np_iface = nispor::IfaceConf::default();
                np_iface.name = vlan_iface;
                np_iface.iface_type = Some(nispor::IfaceType::Vlan);
                np_iface.state = nispor::IfaceState::Up;
                np_iface.vlan = Some({
                    let mut np_vlan_conf = nispor::VlanConf::default();
                    np_vlan_conf.vlan_id = vlan_id;
                    np_vlan_conf.base_iface = lower.clone();
                    np_vlan_conf
                });
                np_iface
            });
        }
        if attrs.bridged {
            np_ifaces.push({
                let mut np_iface = nispor::IfaceConf::default();
                np_iface.name = network.to_string();
                np_iface.iface_type = Some(nispor::IfaceType::Bridge);
                np_iface.state = nispor::IfaceState::Up;
                np_iface
            });
            np_ifaces.push({
                let mut np_iface = nispor::IfaceConf::default();
                np_iface.name = top.clone();
                np_iface.iface_type = Some(if attrs.vlan.is_some() {
                    nispor::IfaceType::Vlan
                } else {
                    lower_iface_type(&attrs)
                });
                np_iface.state = nispor::IfaceState::Up;
                np_iface.controller = Some(network.to_string());
                np_iface
            });
        }
        apply_np_ifaces(np_ifaces)?;

        for dev in [lower.as_str(), top.as_str(), ip_iface.as_str()] {
            if self.sysfs.mtu(dev)? != attrs.mtu {
                self.sysfs.set_mtu(dev, attrs.mtu)?;
            }
        }
        if let Some(stp) = attrs.stp {
            self.sysfs.set_bridge_stp(network, stp)?;
        }

        apply_static_ip(&ip_iface, &attrs)?;
        if attrs.bootproto == BootProto::Dhcp || attrs.dhcpv6 {
            self.start_dhcp_client(&ip_iface, attrs.dhcpv6)?;
        }
        Ok(())
    }

    fn remove_network(
        &mut self,
        network: &str,
        net_attr: &NetAttrs,
    ) -> Result<(), HostNetError> {
        let attrs = NetworkAttributes::try_from(net_attr)?;
        let (lower, _, ip_iface) = devices(network, &attrs)?;
        log::info!("Removing network {}", network);
        self.stop_dhcp_client(&ip_iface);

        let mut np_ifaces = Vec::new();
        if attrs.bridged && self.sysfs.link_exists(network) {
            np_ifaces.push(absent_iface(network, nispor::IfaceType::Bridge));
        }
        if let Some(vlan_iface) = attrs.vlan_device() {
            if self.sysfs.link_exists(&vlan_iface) {
                np_ifaces
                    .push(absent_iface(&vlan_iface, nispor::IfaceType::Vlan));
            }
        } else if !attrs.bridged && self.sysfs.link_exists(&lower) {
            // The addresses live on the nic or bond itself
            np_ifaces.push({
                let mut np_iface = nispor::IfaceConf::default();
                np_iface.name = lower.clone();
                np_iface.iface_type = Some(lower_iface_type(&attrs));
                np_iface.state = nispor::IfaceState::Up;
                np_iface.ipv4 = Some(nispor::IpConf::default());
                np_iface.ipv6 = Some(nispor::IpConf::default());
                np_iface
            });
        }
        apply_np_ifaces(np_ifaces)
    }
}

impl NisporConfigurator {
    fn dhcp_pid_file(&self, iface: &str) -> PathBuf {
        PathBuf::from(&self.dhcp.pid_dir).join(format!("{iface}.pid"))
    }

    pub(crate) fn start_dhcp_client(
        &mut self,
        iface: &str,
        ipv6: bool,
    ) -> Result<u32, HostNetError> {
        self.stop_dhcp_client(iface);
        std::fs::create_dir_all(&self.dhcp.pid_dir)?;
        let mut cmd = Command::new(&self.dhcp.command);
        cmd.args(&self.dhcp.args);
        if ipv6 {
            cmd.arg("-6");
        }
        cmd.arg(iface);
        let child = cmd.spawn().map_err(|e| {
            HostNetError::new(
                ErrorKind::PluginFailure,
                format!(
                    "Failed to start DHCP client {} on {iface}: {e}",
                    self.dhcp.command
                ),
            )
        })?;
        let pid = child.id();
        self.reaper.register(pid)?;
        std::fs::write(self.dhcp_pid_file(iface), pid.to_string())?;
        log::info!("Started DHCP client {} on {}", pid, iface);
        Ok(pid)
    }

    /// Stop the client of `iface`, including one started by an earlier
    /// run. A pid file whose process no longer serves `iface` is only
    /// removed.
    pub(crate) fn stop_dhcp_client(&mut self, iface: &str) {
        let pid_file = self.dhcp_pid_file(iface);
        let content = match std::fs::read_to_string(&pid_file) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                log::warn!("Failed to read {}: {}", pid_file.display(), e);
                return;
            }
        };
        if let Err(e) = std::fs::remove_file(&pid_file) {
            log::warn!("Failed to remove {}: {}", pid_file.display(), e);
        }
        let Ok(raw_pid) = content.trim().parse::<i32>() else {
            log::warn!("Invalid pid in {}: {:?}", pid_file.display(), content);
            return;
        };
        if !is_client_of(raw_pid, iface) {
            log::debug!("DHCP client {} of {} is gone", raw_pid, iface);
            return;
        }
        log::info!("Stopping DHCP client {} on {}", raw_pid, iface);
        // The reaper collects the exit status of our own children
        if let Err(e) = kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
            log::warn!("Failed to stop DHCP client {}: {}", raw_pid, e);
        }
    }
}

// Guards against a recycled pid: the command line must name the interface.
fn is_client_of(pid: i32, iface: &str) -> bool {
    match std::fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(cmdline) => cmdline
            .split(|b| *b == 0)
            .any(|arg| arg == iface.as_bytes()),
        Err(_) => false,
    }
}

// (lower device, top device, device holding the IP)
fn devices(
    network: &str,
    attrs: &NetworkAttributes,
) -> Result<(String, String, String), HostNetError> {
    let missing_device = || {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Network {network} has neither nic nor bonding"),
        )
    };
    let lower = attrs.lower_device().ok_or_else(missing_device)?;
    let top = attrs.top_device().ok_or_else(missing_device)?;
    let ip_iface = attrs.ip_device(network).ok_or_else(missing_device)?;
    Ok((lower.to_string(), top, ip_iface))
}

fn lower_iface_type(attrs: &NetworkAttributes) -> nispor::IfaceType {
    if attrs.bonding.is_some() {
        nispor::IfaceType::Bond
    } else {
        nispor::IfaceType::Ethernet
    }
}

fn absent_iface(
    name: &str,
    iface_type: nispor::IfaceType,
) -> nispor::IfaceConf {
    {
        let mut np_iface = nispor::IfaceConf::default();
        np_iface.name = name.to_string();
        np_iface.iface_type = Some(iface_type);
        np_iface.state = nispor::IfaceState::Absent;
        np_iface
    }
}

fn apply_static_ip(
    iface: &str,
    attrs: &NetworkAttributes,
) -> Result<(), HostNetError> {
    let mut np_iface = {
        let mut np_iface = nispor::IfaceConf::default();
        np_iface.name = iface.to_string();
        np_iface.state = nispor::IfaceState::Up;
        np_iface
    };
    if attrs.bootproto == BootProto::None {
        let mut np_ip_conf = nispor::IpConf::default();
        if let (Some(addr), Some(prefix)) = (attrs.ipaddr, attrs.prefix) {
            np_ip_conf.addresses.push({
                let mut ip_conf = nispor::IpAddrConf::default();
                ip_conf.address = addr.to_string();
                ip_conf.prefix_len = prefix;
                ip_conf
            });
        }
        np_iface.ipv4 = Some(np_ip_conf);
    }
    if !attrs.dhcpv6 {
        let mut np_ip_conf = nispor::IpConf::default();
        for cidr in attrs.ipv6addr.iter() {
            let (addr, prefix) = parse_ipv6_cidr(cidr)?;
            np_ip_conf.addresses.push({
                let mut ip_conf = nispor::IpAddrConf::default();
                ip_conf.address = addr.to_string();
                ip_conf.prefix_len = prefix;
                ip_conf
            });
        }
        np_iface.ipv6 = Some(np_ip_conf);
    }
    apply_np_ifaces(vec![np_iface])?;

    if attrs.default_route {
        if let Some(gateway) = attrs.gateway {
            replace_default_route(iface, &gateway.to_string(), false)?;
        }
        if let Some(gateway) = attrs.ipv6gateway.as_deref() {
            replace_default_route(iface, gateway, true)?;
        }
    }
    Ok(())
}

fn apply_np_ifaces(
    np_ifaces: Vec<nispor::IfaceConf>,
) -> Result<(), HostNetError> {
    if np_ifaces.is_empty() {
        return Ok(());
    }
    let np_net_conf = {
        let mut np_net_conf = nispor::NetConf::default();
        np_net_conf.ifaces = Some(np_ifaces);
        np_net_conf
    };
    log::debug!(
        "Applying nispor config on {:?}",
        np_net_conf
            .ifaces
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<&str>>()
    );
    np_net_conf.apply().map_err(np_error_to_hostnet)
}

fn replace_default_route(
    iface: &str,
    gateway: &str,
    ipv6: bool,
) -> Result<(), HostNetError> {
    let mut cmd = Command::new("ip");
    if ipv6 {
        cmd.arg("-6");
    }
    cmd.args(["route", "replace", "default", "via", gateway, "dev", iface]);
    let output = cmd.output().map_err(|e| {
        HostNetError::new(
            ErrorKind::PluginFailure,
            format!("Failed to run ip route: {e}"),
        )
    })?;
    if !output.status.success() {
        return Err(HostNetError::new(
            ErrorKind::PluginFailure,
            format!(
                "Failed to set default route via {gateway} on {iface}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    log::info!("Default route set via {} on {}", gateway, iface);
    Ok(())
}
