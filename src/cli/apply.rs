// SPDX-License-Identifier: Apache-2.0

use std::io::{stdin, Read};
use std::sync::Arc;

use hostnet::{
    persist_running_config, restore_persistent_config, setup_networks,
    Backend, ChildReaper, ConfigStore, HostNetConfig, SetupRequest,
};

use crate::config::load_config;
use crate::error::{CliError, EX_DATAERR};

pub(crate) fn apply_from_stdin(
    matches: &clap::ArgMatches,
    conf_path: &str,
) -> Result<String, CliError> {
    apply(stdin(), matches, conf_path)
}

pub(crate) fn apply_from_files(
    file_paths: &[&str],
    matches: &clap::ArgMatches,
    conf_path: &str,
) -> Result<String, CliError> {
    let mut ret = String::new();
    for file_path in file_paths {
        log::info!("Applying {file_path}");
        ret += &apply(std::fs::File::open(file_path)?, matches, conf_path)?;
    }
    Ok(ret)
}

fn apply<R>(
    reader: R,
    matches: &clap::ArgMatches,
    conf_path: &str,
) -> Result<String, CliError>
where
    R: Read,
{
    let mut request: SetupRequest = serde_yaml::from_reader(reader)?;
    if matches.is_present("FORCE") {
        request.options.force = true;
    }
    if matches.is_present("NO_CONNECTIVITY_CHECK") {
        request.options.connectivity_check = false;
    }
    if let Some(timeout) = matches.value_of("TIMEOUT") {
        request.options.connectivity_timeout =
            Some(timeout.parse::<u64>().map_err(|e| CliError {
                code: EX_DATAERR,
                error_msg: format!("Invalid timeout {timeout}: {e}"),
            })?);
    }

    let conf = load_config(conf_path)?;
    let (_reaper, mut backend) = kernel_backend(&conf)?;
    setup_networks(&request, &mut backend)?;
    let running = backend.running_store.get()?;
    Ok(serde_yaml::to_string(&running)?)
}

pub(crate) fn persist(conf_path: &str) -> Result<String, CliError> {
    let conf = load_config(conf_path)?;
    let (_reaper, mut backend) = kernel_backend(&conf)?;
    persist_running_config(&mut backend)?;
    Ok(String::new())
}

pub(crate) fn restore(conf_path: &str) -> Result<String, CliError> {
    let conf = load_config(conf_path)?;
    let (_reaper, mut backend) = kernel_backend(&conf)?;
    restore_persistent_config(&mut backend)?;
    let running = backend.running_store.get()?;
    Ok(serde_yaml::to_string(&running)?)
}

// The reaper has to outlive every DHCP client started by the backend.
fn kernel_backend(
    conf: &HostNetConfig,
) -> Result<(Arc<ChildReaper>, Backend), CliError> {
    let reaper = Arc::new(ChildReaper::default());
    reaper.start()?;
    let backend = Backend::kernel(conf, reaper.clone());
    Ok((reaper, backend))
}
