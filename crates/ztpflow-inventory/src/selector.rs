//! Target expressions
//!
//! A stage targets hosts with an expression over one group:
//!
//! | expression     | hosts                         |
//! |----------------|-------------------------------|
//! | `leaf`         | every host of `leaf`          |
//! | `spine[0]`     | the first host of `spine`     |
//! | `leaf[1:3]`    | hosts 1 and 2 of `leaf`       |
//! | `leaf[2:]`     | hosts 2.. of `leaf`           |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::resolver::ResolvedGroups;

/// Which members of the group are selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every host
    All,
    /// One host by position
    Index(usize),
    /// Half-open range of positions
    Slice {
        /// First position (default 0)
        start: Option<usize>,
        /// One past the last position (default: group length)
        end: Option<usize>,
    },
}

/// Parsed target expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetSelector {
    group: String,
    selection: Selection,
}

impl TargetSelector {
    /// Select every host of `group`
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            selection: Selection::All,
        }
    }

    /// Select the `index`-th host of `group`
    pub fn index(group: impl Into<String>, index: usize) -> Self {
        Self {
            group: group.into(),
            selection: Selection::Index(index),
        }
    }

    /// Parse an expression
    ///
    /// # Errors
    /// Returns `InventoryError::InvalidSelector` for malformed input.
    pub fn parse(expr: &str) -> Result<Self, InventoryError> {
        let invalid = |reason: &str| InventoryError::InvalidSelector {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let expr_trimmed = expr.trim();
        let (group, selection) = match expr_trimmed.find('[') {
            None => (expr_trimmed, Selection::All),
            Some(open) => {
                let inner = expr_trimmed[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("missing closing `]`"))?;
                let selection = match inner.split_once(':') {
                    None => Selection::Index(
                        parse_position(inner)
                            .ok_or_else(|| invalid("index must be a non-negative integer"))?,
                    ),
                    Some((start, end)) => Selection::Slice {
                        start: parse_bound(start)
                            .map_err(|()| invalid("slice start must be a non-negative integer"))?,
                        end: parse_bound(end)
                            .map_err(|()| invalid("slice end must be a non-negative integer"))?,
                    },
                };
                (&expr_trimmed[..open], selection)
            }
        };

        if group.is_empty() {
            return Err(invalid("group name is empty"));
        }
        if !group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("group name may only contain letters, digits, `-` and `_`"));
        }

        Ok(Self {
            group: group.to_string(),
            selection,
        })
    }

    /// Group the expression reads
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group
    }

    /// Selection applied to the group
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Evaluate against a membership snapshot
    ///
    /// # Errors
    /// Returns an error if the group was not resolved or an index is past
    /// the end of the group. Slices clamp to the group like Python slices.
    pub fn select(&self, groups: &ResolvedGroups) -> Result<Vec<String>, InventoryError> {
        let hosts = groups
            .hosts(&self.group)
            .ok_or_else(|| InventoryError::UnknownGroup(self.group.clone()))?;

        match self.selection {
            Selection::All => Ok(hosts.to_vec()),
            Selection::Index(index) => hosts
                .get(index)
                .map(|h| vec![h.clone()])
                .ok_or_else(|| InventoryError::IndexOutOfRange {
                    group: self.group.clone(),
                    index,
                    len: hosts.len(),
                }),
            Selection::Slice { start, end } => {
                let end = end.unwrap_or(hosts.len()).min(hosts.len());
                let start = start.unwrap_or(0).min(end);
                Ok(hosts[start..end].to_vec())
            }
        }
    }
}

fn parse_position(s: &str) -> Option<usize> {
    s.trim().parse().ok()
}

fn parse_bound(s: &str) -> Result<Option<usize>, ()> {
    if s.trim().is_empty() {
        Ok(None)
    } else {
        parse_position(s).map(Some).ok_or(())
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.group)?;
        match self.selection {
            Selection::All => Ok(()),
            Selection::Index(i) => write!(f, "[{i}]"),
            Selection::Slice { start, end } => {
                f.write_str("[")?;
                if let Some(s) = start {
                    write!(f, "{s}")?;
                }
                f.write_str(":")?;
                if let Some(e) = end {
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl FromStr for TargetSelector {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TargetSelector {
    type Error = InventoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TargetSelector> for String {
    fn from(value: TargetSelector) -> Self {
        value.to_string()
    }
}
