// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed user input: bad address, bad name, bad option string.
    ConfigError,
    /// Semantic conflict in the requested setup, raised before any kernel
    /// change.
    ValidationError,
    /// A bond mutation failed mid-flight or its rollback failed.
    TransactionError,
    /// The connectivity gate did not see the client in time.
    ConnectivityLost,
    /// Failure reported by kernel, netlink or sysfs access.
    PluginFailure,
    /// Acting on a child process which is not tracked by the reaper.
    NotRegistered,
    Bug,
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::Bug
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct HostNetError {
    kind: ErrorKind,
    msg: String,
}

impl std::fmt::Display for HostNetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl Error for HostNetError {}

impl HostNetError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl From<serde_json::Error> for HostNetError {
    fn from(e: serde_json::Error) -> Self {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Invalid property: {e}"),
        )
    }
}

impl From<std::net::AddrParseError> for HostNetError {
    fn from(e: std::net::AddrParseError) -> Self {
        HostNetError::new(
            ErrorKind::ConfigError,
            format!("Invalid IP address : {e}"),
        )
    }
}

impl From<std::io::Error> for HostNetError {
    fn from(e: std::io::Error) -> Self {
        HostNetError::new(ErrorKind::PluginFailure, format!("I/O error: {e}"))
    }
}
