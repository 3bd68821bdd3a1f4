// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use hostnet::HostNetConfig;

use crate::error::CliError;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "/etc/hostnet/hostnet.conf";

/// Load the host settings, a missing file means all defaults.
pub(crate) fn load_config(path: &str) -> Result<HostNetConfig, CliError> {
    let path = std::path::Path::new(path);
    if !path.exists() {
        log::debug!(
            "Configuration {} not found, using defaults",
            path.display()
        );
        return Ok(HostNetConfig::default());
    }
    let mut fd = std::fs::File::open(path)?;
    let mut content = String::new();
    fd.read_to_string(&mut content)?;
    match toml::from_str::<HostNetConfig>(&content) {
        Ok(c) => {
            log::info!("Configuration loaded:\n{content}");
            Ok(c)
        }
        Err(e) => Err(CliError::from(format!(
            "Failed to read configuration from {}: {e}",
            path.display()
        ))),
    }
}
