// SPDX-License-Identifier: Apache-2.0

use crate::{HostNetError, NetAttrs};

/// Applies a single network on top of existing nics or bonds.
///
/// Attributes are always given in normalized form.
pub trait NetworkConfigurator {
    fn add_network(
        &mut self,
        network: &str,
        attrs: &NetAttrs,
    ) -> Result<(), HostNetError>;

    /// Tear down the devices and addresses created by
    /// [NetworkConfigurator::add_network()], nics and bonds are left in
    /// place.
    fn remove_network(
        &mut self,
        network: &str,
        attrs: &NetAttrs,
    ) -> Result<(), HostNetError>;
}
