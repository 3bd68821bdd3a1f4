// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::{ErrorKind, HostNetError, SetupOptions};

pub const DEFAULT_CONNECTIVITY_TIMEOUT: u64 = 4;
pub const DEFAULT_SENTINEL_PATH: &str = "/var/run/hostnet/client.log";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Post-apply liveness check.
///
/// The management client proves it can still reach the host by touching
/// the sentinel file. Only the modification time of that file matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityGate {
    sentinel: PathBuf,
    timeout: u64,
}

impl Default for ConnectivityGate {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL_PATH)
    }
}

impl ConnectivityGate {
    pub fn new<P: AsRef<Path>>(sentinel: P) -> Self {
        Self {
            sentinel: sentinel.as_ref().to_path_buf(),
            timeout: DEFAULT_CONNECTIVITY_TIMEOUT,
        }
    }

    /// Seconds to wait when a request does not carry its own timeout.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sentinel(&self) -> &Path {
        self.sentinel.as_path()
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn check(&self, options: &SetupOptions) -> Result<(), HostNetError> {
        if !options.connectivity_check {
            return Ok(());
        }
        let timeout = options.connectivity_timeout.unwrap_or(self.timeout);
        if self.client_seen(timeout)? {
            Ok(())
        } else {
            log::info!("Connectivity check failed, rolling back");
            Err(HostNetError::new(
                ErrorKind::ConnectivityLost,
                format!(
                    "Connectivity check failed: client not seen within \
                    {timeout} seconds"
                ),
            ))
        }
    }

    /// Poll once per second until the sentinel is modified after the start
    /// of the check, or `timeout` seconds have elapsed.
    pub fn client_seen(&self, timeout: u64) -> Result<bool, HostNetError> {
        let start = SystemTime::now();
        let deadline = Instant::now() + Duration::from_secs(timeout);
        loop {
            if self.touched_since(start)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn touched_since(&self, start: SystemTime) -> Result<bool, HostNetError> {
        match std::fs::metadata(&self.sentinel) {
            Ok(metadata) => Ok(metadata.modified()? > start),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "Sentinel {} does not exist yet",
                    self.sentinel.display()
                );
                Ok(false)
            }
            Err(e) => Err(HostNetError::new(
                ErrorKind::PluginFailure,
                format!(
                    "Failed to stat sentinel {}: {e}",
                    self.sentinel.display()
                ),
            )),
        }
    }
}
