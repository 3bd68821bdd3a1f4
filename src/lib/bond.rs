// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    bond_opts::{running_bond_options, BondMode},
    link::{with_preserved_iface_state, LinkOps},
    ErrorKind, HostNetError,
};

/// Kernel primitives needed to manage bonding devices.
pub trait BondDriver: LinkOps {
    fn bond_exists(&self, bond: &str) -> bool;
    fn create_bond(&self, bond: &str) -> Result<(), HostNetError>;
    fn destroy_bond(&self, bond: &str) -> Result<(), HostNetError>;
    fn add_slave(&self, bond: &str, slave: &str) -> Result<(), HostNetError>;
    fn del_slave(&self, bond: &str, slave: &str) -> Result<(), HostNetError>;
    fn set_option(
        &self,
        bond: &str,
        key: &str,
        value: &str,
    ) -> Result<(), HostNetError>;
    fn slaves(&self, bond: &str) -> Result<BTreeSet<String>, HostNetError>;
    /// Raw option values as shown by the kernel, e.g.
    /// `{"mode": ["active-backup", "1"]}`.
    fn options(
        &self,
        bond: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, HostNetError>;
    fn active_slave(&self, bond: &str) -> Result<String, HostNetError>;
    fn bonds(&self) -> Result<Vec<String>, HostNetError>;
}

/// Handle of a bonding device.
///
/// The handle tracks the slaves it has seen or changed. When the device
/// already exists, the slaves and options given to [Bond::new()] are
/// replaced by the ones found in the kernel.
pub struct Bond<'a> {
    driver: &'a dyn BondDriver,
    name: String,
    slaves: BTreeSet<String>,
    options: Option<BTreeMap<String, String>>,
}

impl std::fmt::Debug for Bond<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bond")
            .field("name", &self.name)
            .field("slaves", &self.slaves)
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> Bond<'a> {
    pub fn new(
        driver: &'a dyn BondDriver,
        name: &str,
        slaves: &[String],
        options: Option<BTreeMap<String, String>>,
    ) -> Result<Self, HostNetError> {
        let mut bond = Self {
            driver,
            name: name.to_string(),
            slaves: slaves.iter().cloned().collect(),
            options,
        };
        bond.refresh()?;
        Ok(bond)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn slaves(&self) -> &BTreeSet<String> {
        &self.slaves
    }

    pub fn options(&self) -> Option<&BTreeMap<String, String>> {
        self.options.as_ref()
    }

    /// Create the device, apply the options and enslave the slaves this
    /// handle was built with.
    pub fn create(&mut self) -> Result<(), HostNetError> {
        self.driver.create_bond(&self.name)?;
        log::info!("Bond {} has been created", self.name);
        if let Some(options) = self.options.clone() {
            self.set_options(&options)?;
        }
        let slaves: Vec<String> =
            std::mem::take(&mut self.slaves).into_iter().collect();
        self.add_slaves(&slaves)
    }

    pub fn destroy(&mut self) -> Result<(), HostNetError> {
        self.driver.destroy_bond(&self.name)?;
        self.slaves.clear();
        log::info!("Bond {} has been destroyed", self.name);
        Ok(())
    }

    pub fn add_slaves(
        &mut self,
        slaves: &[String],
    ) -> Result<(), HostNetError> {
        for slave in slaves {
            with_preserved_iface_state(self.driver, slave, || {
                self.driver.down(slave)?;
                self.driver.add_slave(&self.name, slave)
            })?;
            log::info!("Slave {} has been added to bond {}", slave, self.name);
            self.slaves.insert(slave.to_string());
        }
        Ok(())
    }

    pub fn del_slaves(
        &mut self,
        slaves: &[String],
    ) -> Result<(), HostNetError> {
        for slave in slaves {
            with_preserved_iface_state(self.driver, slave, || {
                self.driver.down(slave)?;
                self.driver.del_slave(&self.name, slave)
            })?;
            log::info!(
                "Slave {} has been removed from bond {}",
                slave,
                self.name
            );
            self.slaves.remove(slave);
        }
        Ok(())
    }

    /// Override existing or default options. The mode is written first as
    /// the kernel validates other options against it.
    pub fn set_options(
        &mut self,
        options: &BTreeMap<String, String>,
    ) -> Result<(), HostNetError> {
        if let Some(mode) = options.get("mode") {
            let mode = BondMode::from_name_or_id(mode).ok_or_else(|| {
                HostNetError::new(
                    ErrorKind::ConfigError,
                    format!("Unknown bonding mode {mode} for {}", self.name),
                )
            })?;
            self.driver.set_option(&self.name, "mode", mode.id())?;
        }
        for (key, value) in options.iter().filter(|(k, _)| *k != "mode") {
            self.driver.set_option(&self.name, key, value)?;
        }
        log::info!("Bond {} options set: {:?}", self.name, options);
        self.options = Some(options.clone());
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.driver.bond_exists(&self.name)
    }

    pub fn active_slave(&self) -> Result<String, HostNetError> {
        self.driver.active_slave(&self.name)
    }

    /// Bring the bond and all its slaves up.
    pub fn up(&self) -> Result<(), HostNetError> {
        self.set_links(true)
    }

    pub fn down(&self) -> Result<(), HostNetError> {
        self.set_links(false)
    }

    /// Reload slaves and options from the kernel when the device exists.
    pub fn refresh(&mut self) -> Result<(), HostNetError> {
        if self.exists() {
            self.slaves = self.driver.slaves(&self.name)?;
            self.options =
                Some(running_bond_options(&self.driver.options(&self.name)?)?);
        }
        Ok(())
    }

    fn set_links(&self, up: bool) -> Result<(), HostNetError> {
        for dev in std::iter::once(&self.name).chain(self.slaves.iter()) {
            if up {
                self.driver.up(dev)?;
            } else {
                self.driver.down(dev)?;
            }
        }
        Ok(())
    }
}

/// Names of all bonding devices known to the kernel.
pub fn bonds(driver: &dyn BondDriver) -> Result<Vec<String>, HostNetError> {
    driver.bonds()
}

/// Snapshot of a bond taken before editing it, used to undo a failed edit.
#[derive(Debug)]
pub struct BondTransaction<'a> {
    bond: Bond<'a>,
    initial_exists: bool,
    initial_slaves: BTreeSet<String>,
    initial_options: Option<BTreeMap<String, String>>,
}

impl<'a> BondTransaction<'a> {
    pub fn begin(bond: Bond<'a>) -> Self {
        Self {
            initial_exists: bond.exists(),
            initial_slaves: bond.slaves.clone(),
            initial_options: bond.options.clone(),
            bond,
        }
    }

    pub fn bond(&mut self) -> &mut Bond<'a> {
        &mut self.bond
    }

    pub fn commit(self) -> Bond<'a> {
        log::debug!("Bond {} transaction committed", self.bond.name);
        self.bond
    }

    /// Revert the bond to the snapshot taken by [BondTransaction::begin()].
    ///
    /// Options changed during the transaction are not reverted.
    pub fn abort(mut self) -> Result<Bond<'a>, HostNetError> {
        log::info!("Bond {} transaction failed, reverting", self.bond.name);
        if !self.bond.exists() {
            // A bond which vanished during the transaction is left to the
            // caller.
            return Ok(self.bond);
        }
        if !self.initial_exists {
            self.bond.destroy()?;
        } else {
            let added: Vec<String> = self
                .bond
                .slaves
                .difference(&self.initial_slaves)
                .cloned()
                .collect();
            let removed: Vec<String> = self
                .initial_slaves
                .difference(&self.bond.slaves)
                .cloned()
                .collect();
            self.bond.del_slaves(&added)?;
            self.bond.add_slaves(&removed)?;
            if self.bond.options != self.initial_options {
                log::warn!(
                    "Bond {} options are not reverted, kept {:?}",
                    self.bond.name,
                    self.bond.options
                );
            }
        }
        Ok(self.bond)
    }
}

/// Run `func` against the bond inside a transaction: commit on success,
/// abort on failure.
///
/// The error of `func` is returned after a successful abort, a failed abort
/// yields a [ErrorKind::TransactionError] naming both failures.
pub fn with_bond_transaction<'a, T>(
    bond: Bond<'a>,
    func: T,
) -> Result<Bond<'a>, HostNetError>
where
    T: FnOnce(&mut Bond<'a>) -> Result<(), HostNetError>,
{
    let mut transaction = BondTransaction::begin(bond);
    match func(transaction.bond()) {
        Ok(()) => Ok(transaction.commit()),
        Err(e) => {
            let name = transaction.bond.name.clone();
            match transaction.abort() {
                Ok(_) => Err(e),
                Err(rollback_err) => Err(HostNetError::new(
                    ErrorKind::TransactionError,
                    format!(
                        "Bond {name} is left in an inconsistent state, \
                        rollback failed: {rollback_err}, after: {e}"
                    ),
                )),
            }
        }
    }
}
