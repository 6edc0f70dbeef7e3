//! Runtime knobs shared by inventory services.

use crate::config::{AttributeUpdatePolicy, InventoryConfig};
use crate::cursor::PageRequest;
use crate::inventory::domain::InventoryDomainError;

/// Paging limits and the attribute update policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Page size used when a request omits `first`.
    pub default_page_size: u32,
    /// Largest accepted `first`.
    pub max_page_size: u32,
    /// Whether attribute-only node edits bump group versions.
    pub attribute_update_policy: AttributeUpdatePolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            attribute_update_policy: AttributeUpdatePolicy::Ignore,
        }
    }
}

impl From<&InventoryConfig> for ServiceSettings {
    fn from(config: &InventoryConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            attribute_update_policy: config.attribute_update_policy,
        }
    }
}

impl ServiceSettings {
    /// Resolves the effective page size of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryDomainError::EmptyPage`] when `first` is zero and
    /// [`InventoryDomainError::PageSizeTooLarge`] when it exceeds
    /// [`Self::max_page_size`].
    pub const fn page_size(&self, request: &PageRequest) -> Result<u32, InventoryDomainError> {
        match request.first {
            Some(0) => Err(InventoryDomainError::EmptyPage),
            Some(first) if first > self.max_page_size => {
                Err(InventoryDomainError::PageSizeTooLarge {
                    requested: first,
                    max: self.max_page_size,
                })
            }
            Some(first) => Ok(first),
            None => Ok(self.default_page_size),
        }
    }

    pub(crate) const fn propagates_attribute_updates(&self) -> bool {
        matches!(
            self.attribute_update_policy,
            AttributeUpdatePolicy::Propagate
        )
    }
}
