//! Domain model for the proxy node inventory.
//!
//! Nodes, subscriptions, groups and the system record are plain value types
//! here; persistence and version bookkeeping live behind the ports.

mod error;
mod group;
mod ids;
mod import;
mod node;
mod subscription;
mod system;
mod tag;

pub use error::InventoryDomainError;
pub use group::{Group, GroupName};
pub use ids::{GroupId, NodeId, SubscriptionId, SystemId};
pub use import::{ImportCandidate, ImportResult, ImportStatus};
pub use node::{NewNode, Node, NodeAttributes, PersistedNodeData};
pub use subscription::{NewSubscription, Subscription};
pub use system::{RunSnapshot, System, encode_group_ids, parse_group_ids};
pub use tag::Tag;
