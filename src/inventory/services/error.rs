//! Service-level error taxonomy.

use crate::cursor::InvalidCursorError;
use crate::inventory::{
    domain::{InventoryDomainError, SubscriptionId},
    ports::InventoryStoreError,
};
use thiserror::Error;

/// Errors returned by inventory services.
#[derive(Debug, Clone, Error)]
pub enum InventoryServiceError {
    /// Input validation failed before any write.
    #[error(transparent)]
    Domain(#[from] InventoryDomainError),

    /// A pagination or removal cursor could not be decoded.
    #[error(transparent)]
    Cursor(#[from] InvalidCursorError),

    /// A node with the same name already exists in the subscription scope.
    #[error("node '{name}' already exists")]
    Duplicate {
        /// Conflicting node name.
        name: String,
        /// Subscription scope of the conflict.
        subscription_id: Option<SubscriptionId>,
    },

    /// The targeted record does not exist.
    #[error("no such {0}")]
    NotFound(String),

    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store failed; the enclosing transaction was rolled back.
    #[error(transparent)]
    Store(InventoryStoreError),
}

/// Coarse error classes exposed to transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryErrorKind {
    /// Bad tag, link, identifier, page size or cursor.
    Validation,
    /// Identical node or lost name race.
    Duplicate,
    /// Zero rows matched.
    NotFound,
    /// Unique constraint violation.
    Conflict,
    /// Storage failure or cancellation.
    Store,
}

impl InventoryServiceError {
    /// Returns the error class.
    #[must_use]
    pub const fn kind(&self) -> InventoryErrorKind {
        match self {
            Self::Domain(_) | Self::Cursor(_) => InventoryErrorKind::Validation,
            Self::Duplicate { .. } => InventoryErrorKind::Duplicate,
            Self::NotFound(_) => InventoryErrorKind::NotFound,
            Self::Conflict(_) => InventoryErrorKind::Conflict,
            Self::Store(_) => InventoryErrorKind::Store,
        }
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<InventoryStoreError> for InventoryServiceError {
    fn from(err: InventoryStoreError) -> Self {
        match err {
            InventoryStoreError::DuplicateNodeName {
                name,
                subscription_id,
            } => Self::Duplicate {
                name,
                subscription_id,
            },
            InventoryStoreError::DuplicateTag(tag) => {
                Self::Conflict(format!("tag '{tag}' is already in use"))
            }
            InventoryStoreError::MissingReference(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

/// Result type for inventory services.
pub type InventoryServiceResult<T> = Result<T, InventoryServiceError>;
