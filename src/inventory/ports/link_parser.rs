//! Link-parsing collaborator.

use crate::inventory::domain::{InventoryDomainError, NodeAttributes};

/// Pure parser turning a node link into connection attributes.
pub trait LinkParser: Send + Sync {
    /// Parses `link`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryDomainError::InvalidLink`] when the link is not
    /// understood.
    fn parse(&self, link: &str) -> Result<NodeAttributes, InventoryDomainError>;
}
