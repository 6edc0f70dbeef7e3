//! Identifier types for the inventory domain.
//!
//! Identifiers are assigned by the store (serial columns) and never change
//! once issued. They are strictly positive.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::InventoryDomainError;

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a store-assigned identifier.
            ///
            /// # Errors
            ///
            /// Returns [`InventoryDomainError::InvalidIdentifier`] when the
            /// value is not strictly positive.
            pub const fn new(value: i64) -> Result<Self, InventoryDomainError> {
                if value <= 0 {
                    return Err(InventoryDomainError::InvalidIdentifier {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(value))
            }

            /// Wraps an identifier read back from the store.
            ///
            /// Store rows always carry positive serial values, so no
            /// validation is performed.
            #[must_use]
            pub const fn from_persisted(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying numeric value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

store_id!(
    /// Identifier of a proxy node.
    NodeId,
    "node"
);

store_id!(
    /// Identifier of a subscription.
    SubscriptionId,
    "subscription"
);

store_id!(
    /// Identifier of a node group.
    GroupId,
    "group"
);

store_id!(
    /// Identifier of the singleton system record.
    SystemId,
    "system"
);
