// SPDX-License-Identifier: Apache-2.0

use crate::HostNetError;

/// Administrative state of network devices.
pub trait LinkOps {
    fn link_exists(&self, dev: &str) -> bool;
    fn is_up(&self, dev: &str) -> Result<bool, HostNetError>;
    fn up(&self, dev: &str) -> Result<(), HostNetError>;
    fn down(&self, dev: &str) -> Result<(), HostNetError>;
}

/// Run `func` and bring `dev` back up afterwards if it was up before and
/// is down now, whatever `func` returned.
pub(crate) fn with_preserved_iface_state<L, T>(
    links: &L,
    dev: &str,
    func: T,
) -> Result<(), HostNetError>
where
    L: LinkOps + ?Sized,
    T: FnOnce() -> Result<(), HostNetError>,
{
    let was_up = links.is_up(dev)?;
    let result = func();
    if was_up && !links.is_up(dev).unwrap_or(false) {
        if let Err(e) = links.up(dev) {
            if result.is_ok() {
                return Err(e);
            }
            log::warn!("Failed to restore {} up state: {}", dev, e);
        }
    }
    result
}
