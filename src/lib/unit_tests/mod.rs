// SPDX-License-Identifier: Apache-2.0

mod bond_opts;
mod canonize;
#[cfg(feature = "query_apply")]
mod dhcp;
mod ip;
mod netinfo;
mod persist;
#[cfg(feature = "query_apply")]
mod reaper;
mod setup;
mod validator;
