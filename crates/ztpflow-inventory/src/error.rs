//! Error types for ztpflow-inventory

use thiserror::Error;

/// Errors loading an inventory or resolving a target expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("failed to read inventory {path}: {reason}")]
    Read {
        /// File path
        path: String,
        /// I/O failure
        reason: String,
    },

    /// Inventory file is not valid TOML for the expected schema
    #[error("failed to parse inventory: {0}")]
    Parse(String),

    /// Two hosts share a name
    #[error("duplicate host in inventory: {0}")]
    DuplicateHost(String),

    /// Group is not defined by the inventory
    #[error("unknown host group: {0}")]
    UnknownGroup(String),

    /// Target expression does not parse
    #[error("invalid target expression `{expr}`: {reason}")]
    InvalidSelector {
        /// Offending expression
        expr: String,
        /// What is wrong with it
        reason: String,
    },

    /// Index past the end of the group
    #[error("{group}[{index}] is out of range (group has {len} hosts)")]
    IndexOutOfRange {
        /// Group name
        group: String,
        /// Requested index
        index: usize,
        /// Group size
        len: usize,
    },
}
