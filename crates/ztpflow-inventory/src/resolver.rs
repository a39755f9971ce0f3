//! Host-group resolution

use std::collections::BTreeMap;

use crate::error::InventoryError;
use crate::types::Inventory;

/// Group every inventory contains implicitly
pub const ALL_GROUP: &str = "all";

/// Answers which switches belong to a group
///
/// Implementations must return hosts in a stable order; `group[0]` means
/// "the first host of the group" and has to mean the same host every run.
pub trait HostGroupResolver: Send + Sync {
    /// Hosts of `group`, or `None` when the group does not exist
    fn resolve(&self, group: &str) -> Option<Vec<String>>;

    /// Every group name this resolver knows
    fn group_names(&self) -> Vec<String>;
}

impl HostGroupResolver for Inventory {
    fn resolve(&self, group: &str) -> Option<Vec<String>> {
        if group == ALL_GROUP {
            return Some(self.hosts.iter().map(|h| h.name.clone()).collect());
        }
        let members: Vec<String> = self
            .hosts
            .iter()
            .filter(|h| h.groups.iter().any(|g| g == group))
            .map(|h| h.name.clone())
            .collect();
        (!members.is_empty()).then_some(members)
    }

    fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![ALL_GROUP.to_string()];
        for host in &self.hosts {
            for group in &host.groups {
                if !names.contains(group) {
                    names.push(group.clone());
                }
            }
        }
        names
    }
}

/// Immutable snapshot of group membership for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl ResolvedGroups {
    /// Resolve the named groups once
    ///
    /// # Errors
    /// Returns `InventoryError::UnknownGroup` for the first group the
    /// resolver does not know.
    pub fn resolve<'a, I>(
        resolver: &dyn HostGroupResolver,
        names: I,
    ) -> Result<Self, InventoryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in names {
            if groups.contains_key(name) {
                continue;
            }
            let hosts = resolver
                .resolve(name)
                .ok_or_else(|| InventoryError::UnknownGroup(name.to_string()))?;
            groups.insert(name.to_string(), hosts);
        }
        Ok(Self { groups })
    }

    /// Hosts of a resolved group
    #[must_use]
    pub fn hosts(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Every distinct host across all resolved groups, by group name then position
    #[must_use]
    pub fn all_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for members in self.groups.values() {
            for host in members {
                if !hosts.contains(host) {
                    hosts.push(host.clone());
                }
            }
        }
        hosts
    }

    /// Iterate over (group, hosts)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
