// SPDX-License-Identifier: Apache-2.0

mod apply;
mod config;
mod error;
mod query;
mod result;

use env_logger::Builder;
use log::LevelFilter;

use crate::apply::{apply_from_files, apply_from_stdin, persist, restore};
use crate::config::DEFAULT_CONFIG_PATH;
use crate::query::{diff, show};
use crate::result::print_result_and_exit;

const APP_NAME: &str = "hostnetctl";

const SUB_CMD_SHOW: &str = "show";
const SUB_CMD_DIFF: &str = "diff";
const SUB_CMD_APPLY: &str = "apply";
const SUB_CMD_PERSIST: &str = "persist";
const SUB_CMD_RESTORE: &str = "restore";
const SUB_CMD_VERSION: &str = "version";

fn main() {
    let matches = clap::Command::new(APP_NAME)
        .version(clap::crate_version!())
        .about("Command line of hostnet")
        .subcommand_required(true)
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Set verbose level")
                .global(true),
        )
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .help("Disable logging")
                .global(true),
        )
        .arg(
            clap::Arg::new("CONFIG")
                .short('c')
                .long("config")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .help("Host configuration file")
                .global(true),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_SHOW)
                .about("Show host network information")
                .arg(
                    clap::Arg::new("RUNNING_CONFIG")
                        .short('r')
                        .long("running-config")
                        .takes_value(false)
                        .conflicts_with("KERNEL_CONFIG")
                        .help("Show the stored running configuration"),
                )
                .arg(
                    clap::Arg::new("KERNEL_CONFIG")
                        .short('k')
                        .long("kernel-config")
                        .takes_value(false)
                        .help(
                            "Show the configuration translated from the \
                            kernel",
                        ),
                )
                .arg(
                    clap::Arg::new("JSON")
                        .long("json")
                        .takes_value(false)
                        .help("Show state in json format"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_DIFF)
                .about(
                    "Show networks and bonds whose kernel state differs \
                    from the running configuration",
                )
                .arg(
                    clap::Arg::new("JSON")
                        .long("json")
                        .takes_value(false)
                        .help("Show difference in json format"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_APPLY)
                .about("Set up networks and bonds")
                .alias("setup")
                .arg(
                    clap::Arg::new("REQUEST_FILE")
                        .required(false)
                        .multiple_occurrences(true)
                        .index(1)
                        .help("Request files, '-' or none for stdin"),
                )
                .arg(
                    clap::Arg::new("FORCE")
                        .long("force")
                        .takes_value(false)
                        .help("Skip validation of the request"),
                )
                .arg(
                    clap::Arg::new("NO_CONNECTIVITY_CHECK")
                        .long("no-connectivity-check")
                        .takes_value(false)
                        .help("Do not wait for the client after applying"),
                )
                .arg(
                    clap::Arg::new("TIMEOUT")
                        .long("timeout")
                        .short('t')
                        .takes_value(true)
                        .help(
                            "Seconds to wait for the client before rolling \
                            back",
                        ),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_PERSIST)
                .about("Store running configuration to restore on boot"),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_RESTORE)
                .about("Restore the persisted configuration"),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_VERSION).about("Show version"),
        )
        .get_matches();

    let (log_module_filters, log_level) =
        match matches.occurrences_of("verbose") {
            0 => (vec!["hostnet", "hostnetctl"], LevelFilter::Info),
            1 => (vec!["hostnet", "hostnetctl"], LevelFilter::Debug),
            _ => (vec![""], LevelFilter::Debug),
        };

    if !matches.is_present("quiet") {
        let mut log_builder = Builder::new();
        for log_module_filter in log_module_filters {
            if !log_module_filter.is_empty() {
                log_builder.filter(Some(log_module_filter), log_level);
            } else {
                log_builder.filter(None, log_level);
            }
        }
        log_builder.init();
    }

    let conf_path = matches.value_of("CONFIG").unwrap_or(DEFAULT_CONFIG_PATH);

    if let Some(matches) = matches.subcommand_matches(SUB_CMD_SHOW) {
        print_result_and_exit(show(matches, conf_path));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_DIFF) {
        print_result_and_exit(diff(matches, conf_path));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_APPLY) {
        match matches.values_of("REQUEST_FILE") {
            Some(file_paths) => {
                let file_paths: Vec<&str> = file_paths.collect();
                if file_paths.first() == Some(&"-") {
                    print_result_and_exit(apply_from_stdin(
                        matches, conf_path,
                    ));
                } else {
                    print_result_and_exit(apply_from_files(
                        &file_paths,
                        matches,
                        conf_path,
                    ));
                }
            }
            None => {
                print_result_and_exit(apply_from_stdin(matches, conf_path))
            }
        }
    } else if matches.subcommand_matches(SUB_CMD_PERSIST).is_some() {
        print_result_and_exit(persist(conf_path));
    } else if matches.subcommand_matches(SUB_CMD_RESTORE).is_some() {
        print_result_and_exit(restore(conf_path));
    } else if matches.subcommand_matches(SUB_CMD_VERSION).is_some() {
        print_result_and_exit(Ok(format!(
            "{} {}",
            APP_NAME,
            clap::crate_version!()
        )));
    }
}
