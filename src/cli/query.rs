// SPDX-License-Identifier: Apache-2.0

use hostnet::{ConfigStore, FileConfigStore, KernelConfig, NetInfoProbe};
use serde::Serialize;

use crate::config::load_config;
use crate::error::CliError;

pub(crate) fn show(
    matches: &clap::ArgMatches,
    conf_path: &str,
) -> Result<String, CliError> {
    let conf = load_config(conf_path)?;
    let running = FileConfigStore::new(&conf.store.running_dir).get()?;
    let json = matches.is_present("JSON");
    if matches.is_present("RUNNING_CONFIG") {
        return to_string(&running, json);
    }
    let probe = hostnet::NisporProbe::new(hostnet::SysfsNet::new(
        &conf.kernel.sysfs_root,
    ));
    let netinfo = probe.probe(&running)?;
    if matches.is_present("KERNEL_CONFIG") {
        to_string(&KernelConfig::new(&netinfo)?, json)
    } else {
        to_string(&netinfo, json)
    }
}

pub(crate) fn diff(
    matches: &clap::ArgMatches,
    conf_path: &str,
) -> Result<String, CliError> {
    let conf = load_config(conf_path)?;
    let running = FileConfigStore::new(&conf.store.running_dir).get()?;
    let probe = hostnet::NisporProbe::new(hostnet::SysfsNet::new(
        &conf.kernel.sysfs_root,
    ));
    let kernel_config = KernelConfig::new(&probe.probe(&running)?)?;
    let diff = kernel_config.diff(&running)?;
    if diff.is_empty() {
        log::info!("Kernel matches the running configuration");
    }
    to_string(&diff, matches.is_present("JSON"))
}

fn to_string<T: Serialize>(data: &T, json: bool) -> Result<String, CliError> {
    Ok(if json {
        serde_json::to_string_pretty(data)?
    } else {
        serde_yaml::to_string(data)?
    })
}
