// SPDX-License-Identifier: Apache-2.0

use crate::{ErrorKind, HostNetError};

pub(crate) fn np_error_to_hostnet(e: nispor::NisporError) -> HostNetError {
    HostNetError::new(
        ErrorKind::PluginFailure,
        format!("Error from nispor plugin: {}, {}", e.kind, e.msg),
    )
}
