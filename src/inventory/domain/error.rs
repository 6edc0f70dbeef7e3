//! Error types for inventory domain validation and parsing.

use thiserror::Error;

/// Validation failures raised before any store write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryDomainError {
    /// The tag is empty, too long, or contains forbidden characters.
    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag {
        /// The rejected tag.
        tag: String,
        /// Why the tag was rejected.
        reason: &'static str,
    },

    /// The link could not be parsed into node attributes.
    #[error("not a valid link: {reason}")]
    InvalidLink {
        /// Parser diagnostic.
        reason: String,
    },

    /// A store identifier was zero or negative.
    #[error("invalid {kind} identifier: {value}")]
    InvalidIdentifier {
        /// The identifier kind (node, subscription, ...).
        kind: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A group name was empty.
    #[error("group name must not be empty")]
    EmptyGroupName,

    /// The requested page size is zero.
    #[error("page size must be at least 1")]
    EmptyPage,

    /// The requested page size exceeds the configured maximum.
    #[error("page size {requested} exceeds the maximum of {max}")]
    PageSizeTooLarge {
        /// Requested `first` value.
        requested: u32,
        /// Configured maximum.
        max: u32,
    },
}

impl InventoryDomainError {
    /// Creates an invalid-link error.
    #[must_use]
    pub fn invalid_link(reason: impl Into<String>) -> Self {
        Self::InvalidLink {
            reason: reason.into(),
        }
    }
}
