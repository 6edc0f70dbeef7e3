//! Node groups consumed by a running configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{GroupId, InventoryDomainError, SystemId};

/// Non-empty group name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Validates a group name.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryDomainError::EmptyGroupName`] for blank names.
    pub fn new(value: impl Into<String>) -> Result<Self, InventoryDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InventoryDomainError::EmptyGroupName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, versioned selection set of nodes.
///
/// `version` advances whenever membership or an underlying node changes in a
/// way the running configuration must observe. `system_id` is set while the
/// group belongs to the running system's active group set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Store-assigned identifier.
    pub id: GroupId,
    /// Group name.
    pub name: GroupName,
    /// Opaque selection policy.
    pub policy: String,
    /// Monotonic change counter.
    pub version: u64,
    /// Set while the group is part of the running configuration.
    pub system_id: Option<SystemId>,
}

impl Group {
    /// Returns `true` when the group belongs to the active group set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.system_id.is_some()
    }
}
