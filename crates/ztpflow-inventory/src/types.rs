//! Inventory file types

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InventoryError;

/// A switch known to the provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Switch name (as used by the fabric, e.g. `auto-spine1`)
    pub name: String,
    /// Management address; defaults to the name
    #[serde(default)]
    pub addr: Option<String>,
    /// Login user; falls back to the configured credentials
    #[serde(default)]
    pub user: Option<String>,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Groups this switch belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

fn default_port() -> u16 {
    22
}

impl HostEntry {
    /// Create an entry with no groups
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: None,
            user: None,
            port: default_port(),
            groups: Vec::new(),
        }
    }

    /// Add the switch to a group
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Address to dial
    #[must_use]
    pub fn address(&self) -> &str {
        self.addr.as_deref().unwrap_or(&self.name)
    }

    /// Whether the switch is the machine we are running on
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.address(), "localhost" | "127.0.0.1" | "::1")
    }
}

/// Ordered list of switches, as loaded from `inventory.toml`
///
/// ```toml
/// [[host]]
/// name = "auto-spine1"
/// addr = "10.9.1.1"
/// groups = ["spine"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Switches in declaration order
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostEntry>,
}

impl Inventory {
    /// Build an inventory from entries
    ///
    /// # Errors
    /// Returns `InventoryError::DuplicateHost` if two entries share a name.
    pub fn new(hosts: Vec<HostEntry>) -> Result<Self, InventoryError> {
        let inventory = Self { hosts };
        inventory.validate()?;
        Ok(inventory)
    }

    /// Parse an inventory from TOML text
    ///
    /// # Errors
    /// Returns an error if the text does not parse or names a host twice.
    pub fn from_toml_str(content: &str) -> Result<Self, InventoryError> {
        let inventory: Inventory =
            toml::from_str(content).map_err(|e| InventoryError::Parse(e.to_string()))?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Load an inventory file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path).map_err(|e| InventoryError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let inventory = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), hosts = inventory.hosts.len(), "loaded inventory");
        Ok(inventory)
    }

    /// Look up a switch by name
    #[must_use]
    pub fn host(&self, name: &str) -> Option<&HostEntry> {
        self.hosts.iter().find(|h| h.name == name)
    }

    fn validate(&self) -> Result<(), InventoryError> {
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.name.as_str()) {
                return Err(InventoryError::DuplicateHost(host.name.clone()));
            }
        }
        Ok(())
    }
}
