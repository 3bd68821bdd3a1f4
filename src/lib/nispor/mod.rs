// SPDX-License-Identifier: Apache-2.0

mod apply;
mod error;
mod show;

pub use apply::NisporConfigurator;
pub use show::NisporProbe;
