// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{ErrorKind, HostNetError, NetAttrs, NetConfig};

pub const DEFAULT_RUNNING_CONFIG_DIR: &str = "/var/run/hostnet/netconf";
pub const DEFAULT_PERSISTENT_CONFIG_DIR: &str =
    "/var/lib/hostnet/persistence/netconf";

const NETS_DIR: &str = "nets";
const BONDS_DIR: &str = "bonds";

pub trait ConfigStore {
    fn get(&self) -> Result<NetConfig, HostNetError>;
    fn set(&mut self, config: &NetConfig) -> Result<(), HostNetError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryConfigStore {
    config: NetConfig,
}

impl MemoryConfigStore {
    pub fn new(config: NetConfig) -> Self {
        Self { config }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self) -> Result<NetConfig, HostNetError> {
        Ok(self.config.clone())
    }

    fn set(&mut self, config: &NetConfig) -> Result<(), HostNetError> {
        self.config = config.clone();
        Ok(())
    }
}

/// One JSON file per entity:
/// ```text
/// <dir>/nets/<network>
/// <dir>/bonds/<bond>
/// ```
/// A missing directory holds an empty configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self) -> Result<NetConfig, HostNetError> {
        let mut config = NetConfig::new();
        config.networks = read_entities(&self.dir.join(NETS_DIR))?;
        config.bonds = read_entities(&self.dir.join(BONDS_DIR))?;
        Ok(config)
    }

    fn set(&mut self, config: &NetConfig) -> Result<(), HostNetError> {
        write_entities(&self.dir.join(NETS_DIR), &config.networks)?;
        write_entities(&self.dir.join(BONDS_DIR), &config.bonds)?;
        log::info!("Saved configuration to {}", self.dir.display());
        Ok(())
    }
}

fn read_entities(
    dir: &Path,
) -> Result<BTreeMap<String, NetAttrs>, HostNetError> {
    let mut ret = BTreeMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ret);
        }
        Err(e) => return Err(store_error(dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| store_error(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let content =
            std::fs::read_to_string(&path).map_err(|e| store_error(&path, e))?;
        let attrs: NetAttrs = serde_json::from_str(&content).map_err(|e| {
            HostNetError::new(
                ErrorKind::ConfigError,
                format!("Invalid content in {}: {e}", path.display()),
            )
        })?;
        ret.insert(name, attrs);
    }
    Ok(ret)
}

// Entities not in `entities` are deleted from `dir`.
fn write_entities(
    dir: &Path,
    entities: &BTreeMap<String, NetAttrs>,
) -> Result<(), HostNetError> {
    std::fs::create_dir_all(dir).map_err(|e| store_error(dir, e))?;
    for entry in std::fs::read_dir(dir).map_err(|e| store_error(dir, e))? {
        let entry = entry.map_err(|e| store_error(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !entities.contains_key(&name) {
            std::fs::remove_file(entry.path())
                .map_err(|e| store_error(&entry.path(), e))?;
        }
    }
    for (name, attrs) in entities {
        let path = dir.join(name);
        let content = serde_json::to_string_pretty(attrs)?;
        std::fs::write(&path, content).map_err(|e| store_error(&path, e))?;
    }
    Ok(())
}

fn store_error(path: &Path, e: std::io::Error) -> HostNetError {
    HostNetError::new(
        ErrorKind::PluginFailure,
        format!("Configuration store {}: {e}", path.display()),
    )
}
