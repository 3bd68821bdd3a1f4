// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    attributes::BondAttributes,
    bond::{with_bond_transaction, Bond, BondDriver},
    bond_opts::{default_bond_options, BondMode},
    canonize::{canonize_request, is_remove},
    connectivity::ConnectivityGate,
    persist::ConfigStore,
    validator::validate,
    normalize, ConfigDiff, ErrorKind, HostNetError, KernelConfig, NetAttrs,
    NetConfig, NetInfoProbe, NetworkConfigurator,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct SetupOptions {
    /// Skip request validation.
    pub force: bool,
    pub connectivity_check: bool,
    /// Seconds to wait for the client after applying, the host default
    /// when unset.
    pub connectivity_timeout: Option<u64>,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            force: false,
            connectivity_check: true,
            connectivity_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
/// Networks and bonds to add, edit or remove (`remove: true`).
///
/// Example in YAML:
/// ```yml
/// networks:
///   ovirtmgmt:
///     bonding: bond0
///     bootproto: dhcp
///     defaultRoute: true
///   old_net:
///     remove: true
/// bondings:
///   bond0:
///     nics: [eth0, eth1]
///     options: mode=4 miimon=150
/// options:
///   connectivityCheck: true
///   connectivityTimeout: 10
/// ```
pub struct SetupRequest {
    pub networks: BTreeMap<String, NetAttrs>,
    pub bondings: BTreeMap<String, NetAttrs>,
    pub options: SetupOptions,
}

impl SetupRequest {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything [setup_networks()] reads from or writes to.
pub struct Backend {
    pub probe: Box<dyn NetInfoProbe>,
    pub bond_driver: Box<dyn BondDriver>,
    pub configurator: Box<dyn NetworkConfigurator>,
    pub running_store: Box<dyn ConfigStore>,
    /// Safe configuration restored on boot.
    pub persistent_store: Box<dyn ConfigStore>,
    pub connectivity: ConnectivityGate,
}

#[cfg(feature = "query_apply")]
impl Backend {
    /// Backend acting on the local kernel as described by `conf`.
    pub fn kernel(
        conf: &crate::HostNetConfig,
        reaper: std::sync::Arc<crate::ChildReaper>,
    ) -> Self {
        let sysfs = crate::SysfsNet::new(&conf.kernel.sysfs_root);
        Self {
            probe: Box::new(crate::NisporProbe::new(sysfs.clone())),
            bond_driver: Box::new(sysfs.clone()),
            configurator: Box::new(crate::NisporConfigurator::new(
                sysfs,
                conf.dhcp.clone(),
                reaper,
            )),
            running_store: Box::new(crate::FileConfigStore::new(
                &conf.store.running_dir,
            )),
            persistent_store: Box::new(crate::FileConfigStore::new(
                &conf.store.persistent_dir,
            )),
            connectivity: ConnectivityGate::new(
                &conf.connectivity.sentinel_path,
            )
            .with_timeout(conf.connectivity.timeout),
        }
    }
}

// What a request changes on the host, in apply order.
#[derive(Debug, Default)]
struct ApplyPlan {
    // Networks to tear down with the attributes they were created with
    nets_to_remove: Vec<(String, NetAttrs)>,
    bonds_to_remove: Vec<String>,
    bonds_to_edit: Vec<(String, BondAttributes)>,
    nets_to_add: Vec<(String, NetAttrs)>,
}

// What has been touched so far, undone in reverse order on failure.
#[derive(Debug, Default)]
struct Applied {
    removed_networks: Vec<(String, NetAttrs)>,
    bonds: Vec<String>,
    added_networks: Vec<(String, NetAttrs)>,
}

/// Apply a request to the host.
///
/// The request is canonized and validated (unless `force`), merged into
/// the running configuration and compared with the kernel. Only requested
/// entities which differ from the kernel are touched: changed networks are
/// removed, bonds removed or edited, then networks added. Once the
/// connectivity gate passes, the merged configuration becomes the running
/// one. Any failure rolls every touched entity back to the previous running
/// configuration and the original error is returned, or a
/// [ErrorKind::TransactionError] if the rollback failed too.
pub fn setup_networks(
    request: &SetupRequest,
    backend: &mut Backend,
) -> Result<(), HostNetError> {
    let mut request = request.clone();
    canonize_request(&mut request)?;

    let running = backend.running_store.get()?;
    let netinfo = backend.probe.probe(&running)?;
    if request.options.force {
        log::warn!("Skipping validation of forced request");
    } else {
        validate(&request, &running, &netinfo)?;
    }

    let desired = merge_request(&running, &request);
    let kernel_config = KernelConfig::new(&netinfo)?;
    let diff = kernel_config.diff(&desired)?;
    log::debug!("Kernel differs from desired configuration: {:?}", diff);

    let desired = normalize(&desired)?;
    let previous = previous_config(&running, &kernel_config)?;
    let plan =
        ApplyPlan::new(&request, &desired, &previous, &kernel_config, &diff)?;
    log::debug!("Apply plan: {:?}", plan);

    let mut applied = Applied::default();
    if let Err(e) = apply_plan(backend, &plan, &mut applied)
        .and_then(|()| backend.connectivity.check(&request.options))
    {
        log::error!("Failed to setup networks: {}, rolling back", e);
        return match rollback(backend, &applied, &previous) {
            Ok(()) => Err(e),
            Err(rollback_err) => Err(HostNetError::new(
                ErrorKind::TransactionError,
                format!("Rollback failed: {rollback_err}, after: {e}"),
            )),
        };
    }
    backend.running_store.set(&merge_request(&running, &request))?;
    log::info!("Networks set up");
    Ok(())
}

/// Store the running configuration as the one to restore on boot.
pub fn persist_running_config(
    backend: &mut Backend,
) -> Result<(), HostNetError> {
    let running = backend.running_store.get()?;
    backend.persistent_store.set(&running)?;
    log::info!("Running configuration persisted");
    Ok(())
}

/// Bring the host back to the persisted configuration.
///
/// Entities only present in the running configuration are removed. No
/// validation nor connectivity check is done.
pub fn restore_persistent_config(
    backend: &mut Backend,
) -> Result<(), HostNetError> {
    let persistent = backend.persistent_store.get()?;
    let running = backend.running_store.get()?;
    let mut request = SetupRequest::new();
    request.options.force = true;
    request.options.connectivity_check = false;

    let remove_attrs = || {
        let mut attrs = NetAttrs::new();
        attrs.insert("remove".to_string(), serde_json::Value::Bool(true));
        attrs
    };
    for net in running.networks.keys() {
        if !persistent.networks.contains_key(net) {
            request.networks.insert(net.to_string(), remove_attrs());
        }
    }
    for bond in running.bonds.keys() {
        if !persistent.bonds.contains_key(bond) {
            request.bondings.insert(bond.to_string(), remove_attrs());
        }
    }
    request.networks.extend(persistent.networks.into_iter());
    request.bondings.extend(persistent.bonds.into_iter());
    log::info!("Restoring persistent configuration");
    setup_networks(&request, backend)
}

fn merge_request(running: &NetConfig, request: &SetupRequest) -> NetConfig {
    let mut desired = running.clone();
    for (net, net_attr) in request.networks.iter() {
        if is_remove(net_attr) {
            desired.remove_network(net);
        } else {
            desired.set_network(net, &without_remove(net_attr));
        }
    }
    for (bond, bond_attr) in request.bondings.iter() {
        if is_remove(bond_attr) {
            desired.remove_bonding(bond);
        } else {
            desired.set_bonding(bond, &without_remove(bond_attr));
        }
    }
    desired
}

fn without_remove(attrs: &NetAttrs) -> NetAttrs {
    let mut attrs = attrs.clone();
    attrs.remove("remove");
    attrs
}

// The normalized running configuration, completed with what is only found
// in the kernel.
fn previous_config(
    running: &NetConfig,
    kernel_config: &KernelConfig,
) -> Result<NetConfig, HostNetError> {
    let mut previous = normalize(running)?;
    let kernel = normalize(kernel_config.as_net_config())?;
    for (net, attrs) in kernel.networks {
        previous.networks.entry(net).or_insert(attrs);
    }
    for (bond, attrs) in kernel.bonds {
        previous.bonds.entry(bond).or_insert(attrs);
    }
    Ok(previous)
}

impl ApplyPlan {
    fn new(
        request: &SetupRequest,
        desired: &NetConfig,
        previous: &NetConfig,
        kernel_config: &KernelConfig,
        diff: &ConfigDiff,
    ) -> Result<Self, HostNetError> {
        let mut plan = Self::default();
        let nets_to_apply = diff.networks_to_apply();
        let bonds_to_apply = diff.bonds_to_apply();
        // Networks not seen in the kernel have nothing to tear down
        let in_kernel = |net: &str| kernel_config.networks().contains_key(net);

        for (net, net_attr) in request.networks.iter() {
            if is_remove(net_attr) {
                match previous.networks.get(net) {
                    Some(old) if in_kernel(net) => {
                        plan.nets_to_remove.push((net.clone(), old.clone()));
                    }
                    _ => log::info!("Network {} is not configured", net),
                }
                continue;
            }
            if !nets_to_apply.contains(net.as_str()) {
                log::info!("Network {} is unchanged", net);
                continue;
            }
            if in_kernel(net) {
                if let Some(old) = previous.networks.get(net) {
                    plan.nets_to_remove.push((net.clone(), old.clone()));
                }
            }
            if let Some(attrs) = desired.networks.get(net) {
                plan.nets_to_add.push((net.clone(), attrs.clone()));
            }
        }

        for (bond, bond_attr) in request.bondings.iter() {
            if is_remove(bond_attr) {
                if kernel_config.bonds().contains_key(bond) {
                    plan.bonds_to_remove.push(bond.clone());
                }
            } else if !bonds_to_apply.contains(bond.as_str()) {
                log::info!("Bond {} is unchanged", bond);
            } else if let Some(attrs) = desired.bonds.get(bond) {
                plan.bonds_to_edit
                    .push((bond.clone(), BondAttributes::try_from(attrs)?));
            }
        }
        Ok(plan)
    }
}

fn apply_plan(
    backend: &mut Backend,
    plan: &ApplyPlan,
    applied: &mut Applied,
) -> Result<(), HostNetError> {
    for (net, attrs) in plan.nets_to_remove.iter() {
        backend.configurator.remove_network(net, attrs)?;
        applied.removed_networks.push((net.clone(), attrs.clone()));
    }
    for bond in plan.bonds_to_remove.iter() {
        applied.bonds.push(bond.clone());
        let mut bond =
            Bond::new(backend.bond_driver.as_ref(), bond, &[], None)?;
        if bond.exists() {
            bond.destroy()?;
        }
    }
    for (bond, attrs) in plan.bonds_to_edit.iter() {
        applied.bonds.push(bond.clone());
        edit_bond(backend.bond_driver.as_ref(), bond, attrs)?;
    }
    for (net, attrs) in plan.nets_to_add.iter() {
        applied.added_networks.push((net.clone(), attrs.clone()));
        backend.configurator.add_network(net, attrs)?;
    }
    Ok(())
}

/// Create the bond or bring an existing one to the wanted slaves and
/// options, reverting the bond on failure.
fn edit_bond(
    driver: &dyn BondDriver,
    name: &str,
    attrs: &BondAttributes,
) -> Result<(), HostNetError> {
    let bond =
        Bond::new(driver, name, &attrs.nics, Some(attrs.options.clone()))?;
    with_bond_transaction(bond, |bond| {
        if !bond.exists() {
            return bond.create();
        }
        let wanted: BTreeSet<String> = attrs.nics.iter().cloned().collect();
        let to_remove: Vec<String> =
            bond.slaves().difference(&wanted).cloned().collect();
        let to_add: Vec<String> =
            wanted.difference(bond.slaves()).cloned().collect();
        bond.del_slaves(&to_remove)?;
        bond.add_slaves(&to_add)?;
        let options = options_to_set(bond.options(), &attrs.options);
        if !options.is_empty() {
            bond.set_options(&options)?;
        }
        Ok(())
    })?;
    Ok(())
}

// Wanted options which differ from the current ones, plus the defaults of
// options which are no longer wanted.
fn options_to_set(
    current: Option<&BTreeMap<String, String>>,
    wanted: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let current = current.cloned().unwrap_or_default();
    let mode = wanted
        .get("mode")
        .and_then(|m| BondMode::from_name_or_id(m))
        .unwrap_or_default();
    let defaults = default_bond_options(mode);
    let mut ret: BTreeMap<String, String> = wanted
        .iter()
        .filter(|(k, v)| current.get(k.as_str()) != Some(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for key in current.keys().filter(|k| !wanted.contains_key(k.as_str())) {
        if key == "mode" {
            ret.insert(key.clone(), mode.id().to_string());
        } else if let Some(default) = defaults.get(key.as_str()) {
            ret.insert(key.clone(), default.to_string());
        }
    }
    ret
}

fn rollback(
    backend: &mut Backend,
    applied: &Applied,
    previous: &NetConfig,
) -> Result<(), HostNetError> {
    let mut errors: Vec<HostNetError> = Vec::new();
    for (net, attrs) in applied.added_networks.iter().rev() {
        if let Err(e) = backend.configurator.remove_network(net, attrs) {
            log::error!("Failed to remove network {}: {}", net, e);
            errors.push(e);
        }
    }
    for bond in applied.bonds.iter().rev() {
        if let Err(e) = restore_bond(
            backend.bond_driver.as_ref(),
            bond,
            previous.bonds.get(bond),
        ) {
            log::error!("Failed to restore bond {}: {}", bond, e);
            errors.push(e);
        }
    }
    for (net, attrs) in applied.removed_networks.iter().rev() {
        if let Err(e) = backend.configurator.add_network(net, attrs) {
            log::error!("Failed to restore network {}: {}", net, e);
            errors.push(e);
        }
    }
    match errors.len() {
        0 => {
            log::info!("Rollback done");
            Ok(())
        }
        _ => Err(HostNetError::new(
            ErrorKind::TransactionError,
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<String>>()
                .join("; "),
        )),
    }
}

fn restore_bond(
    driver: &dyn BondDriver,
    name: &str,
    previous: Option<&NetAttrs>,
) -> Result<(), HostNetError> {
    match previous {
        Some(attrs) => {
            edit_bond(driver, name, &BondAttributes::try_from(attrs)?)
        }
        None => {
            let mut bond = Bond::new(driver, name, &[], None)?;
            if bond.exists() {
                bond.destroy()?;
            }
            Ok(())
        }
    }
}
