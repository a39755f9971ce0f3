//! ztpflow-inventory: Switch inventory and host-group resolution
//!
//! Loads the switch inventory, answers "which switches are in group X", and
//! evaluates target expressions such as `spine[0]` against a frozen snapshot
//! of the groups.

pub mod error;
pub mod resolver;
pub mod selector;
pub mod types;

pub use error::InventoryError;
pub use resolver::{ALL_GROUP, HostGroupResolver, ResolvedGroups};
pub use selector::{Selection, TargetSelector};
pub use types::{HostEntry, Inventory};
