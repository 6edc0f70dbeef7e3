//! Store port: transactional access to nodes, subscriptions, groups and the
//! system record.
//!
//! Every outer inventory operation runs inside exactly one
//! [`InventoryStore::in_transaction`] call. The closure receives an
//! [`InventoryTransaction`] and its `Err` return rolls back every write made
//! through it.

use crate::inventory::domain::{
    Group, GroupId, GroupName, NewNode, NewSubscription, Node, NodeAttributes, NodeId, RunSnapshot,
    Subscription, SubscriptionId, System, SystemId, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type InventoryStoreResult<T> = Result<T, InventoryStoreError>;

/// Which nodes a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeScope {
    /// Every node.
    All,
    /// Nodes added manually, outside any subscription.
    Manual,
    /// Nodes owned by one subscription.
    Subscription(SubscriptionId),
}

impl NodeScope {
    /// Returns the scope matching an optional subscription filter, where
    /// `None` lists every node.
    #[must_use]
    pub const fn from_filter(subscription_id: Option<SubscriptionId>) -> Self {
        match subscription_id {
            Some(id) => Self::Subscription(id),
            None => Self::All,
        }
    }

    /// Returns `true` when `node` belongs to this scope.
    #[must_use]
    pub fn contains(self, node: &Node) -> bool {
        match self {
            Self::All => true,
            Self::Manual => node.subscription_id().is_none(),
            Self::Subscription(id) => node.subscription_id() == Some(id),
        }
    }
}

/// Operations available inside an open store transaction.
///
/// Methods returning `u64` report the number of rows affected. Bulk
/// operations accept slices and must be executed as single set-based
/// statements by relational adapters.
pub trait InventoryTransaction {
    /// Finds a node by identifier.
    fn find_node(&mut self, id: NodeId) -> InventoryStoreResult<Option<Node>>;

    /// Finds the node with `name` in the given subscription scope, where
    /// `None` is the manual-node scope.
    fn find_node_by_name(
        &mut self,
        name: &str,
        subscription_id: Option<SubscriptionId>,
    ) -> InventoryStoreResult<Option<Node>>;

    /// Inserts a node.
    ///
    /// A failed insert leaves the rest of the transaction usable.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryStoreError::DuplicateNodeName`] when the name is
    /// already taken in the subscription scope and
    /// [`InventoryStoreError::DuplicateTag`] when the tag is taken.
    fn insert_node(&mut self, node: &NewNode) -> InventoryStoreResult<Node>;

    /// Replaces the connection attributes of a node.
    fn update_node_attributes(
        &mut self,
        id: NodeId,
        attributes: &NodeAttributes,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64>;

    /// Sets the tag column of a node.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryStoreError::DuplicateTag`] when another node holds
    /// the tag.
    fn set_node_tag(&mut self, id: NodeId, tag: &Tag) -> InventoryStoreResult<u64>;

    /// Deletes node rows. Membership edges must already be gone.
    fn delete_nodes(&mut self, ids: &[NodeId]) -> InventoryStoreResult<u64>;

    /// Returns the identifiers of nodes owned by any of the subscriptions.
    fn node_ids_by_subscriptions(
        &mut self,
        ids: &[SubscriptionId],
    ) -> InventoryStoreResult<Vec<NodeId>>;

    /// Lists nodes in `scope` with identifiers greater than `after`, in
    /// ascending identifier order, returning at most `limit` rows.
    fn list_nodes(
        &mut self,
        scope: NodeScope,
        after: Option<NodeId>,
        limit: usize,
    ) -> InventoryStoreResult<Vec<Node>>;

    /// Counts nodes in `scope`.
    fn count_nodes(&mut self, scope: NodeScope) -> InventoryStoreResult<u64>;

    /// Inserts a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryStoreError::DuplicateTag`] when the tag is taken.
    fn insert_subscription(
        &mut self,
        subscription: &NewSubscription,
    ) -> InventoryStoreResult<Subscription>;

    /// Finds a subscription by identifier.
    fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> InventoryStoreResult<Option<Subscription>>;

    /// Records the latest fetch status and provider info.
    fn update_subscription_status(
        &mut self,
        id: SubscriptionId,
        status: &str,
        info: &str,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64>;

    /// Sets the tag column of a subscription.
    fn set_subscription_tag(&mut self, id: SubscriptionId, tag: &Tag) -> InventoryStoreResult<u64>;

    /// Deletes subscription rows. Owned nodes must already be gone.
    fn delete_subscriptions(&mut self, ids: &[SubscriptionId]) -> InventoryStoreResult<u64>;

    /// Inserts a group with version zero outside the active set.
    fn insert_group(&mut self, name: &GroupName, policy: &str) -> InventoryStoreResult<Group>;

    /// Finds a group by identifier.
    fn find_group(&mut self, id: GroupId) -> InventoryStoreResult<Option<Group>>;

    /// Returns the member node identifiers of a group in ascending order.
    fn group_node_ids(&mut self, id: GroupId) -> InventoryStoreResult<Vec<NodeId>>;

    /// Adds membership edges, ignoring edges that already exist. Returns the
    /// number of new edges.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryStoreError::MissingReference`] when a node does
    /// not exist.
    fn insert_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64>;

    /// Removes membership edges between one group and the given nodes.
    fn delete_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64>;

    /// Removes every membership edge referencing the given nodes.
    fn delete_node_memberships(&mut self, node_ids: &[NodeId]) -> InventoryStoreResult<u64>;

    /// Increments by one the version of every group of `system_id` that has
    /// a membership edge to any of `node_ids`, as a single statement.
    /// Returns the number of groups bumped.
    fn increment_group_versions_for_nodes(
        &mut self,
        system_id: SystemId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64>;

    /// Increments the version of one group.
    fn increment_group_version(&mut self, id: GroupId) -> InventoryStoreResult<u64>;

    /// Returns the system row, creating a stopped one when absent.
    fn get_or_create_system(&mut self) -> InventoryStoreResult<System>;

    /// Marks the system running with the applied snapshot and moves the
    /// snapshot's groups into the active set.
    fn save_system_run(
        &mut self,
        system_id: SystemId,
        snapshot: &RunSnapshot,
        running_at: DateTime<Utc>,
    ) -> InventoryStoreResult<System>;

    /// Marks the system stopped and empties the active group set.
    fn save_system_stop(&mut self, system_id: SystemId) -> InventoryStoreResult<System>;
}

/// Transactional store contract.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Runs `work` inside one transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back when
    /// it returns `Err`. Dropping the returned future before completion
    /// rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or a store error converted into
    /// `E` when the transaction cannot be opened or committed.
    async fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn InventoryTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<InventoryStoreError> + Send + 'static;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum InventoryStoreError {
    /// A node with the same name already exists in the subscription scope.
    #[error("node '{name}' already exists in this subscription scope")]
    DuplicateNodeName {
        /// Conflicting node name.
        name: String,
        /// Subscription scope of the conflict.
        subscription_id: Option<SubscriptionId>,
    },

    /// The tag is already held by another record.
    #[error("tag already in use: {0}")]
    DuplicateTag(Tag),

    /// A referenced row does not exist.
    #[error("missing referenced record: {0}")]
    MissingReference(String),

    /// The caller abandoned the operation; the transaction was rolled back.
    #[error("operation cancelled; transaction rolled back")]
    Cancelled,

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl InventoryStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
