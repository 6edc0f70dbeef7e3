//! Group creation and membership edits.

use super::{
    error::{InventoryServiceError, InventoryServiceResult},
    propagation::propagate_group_change,
};
use crate::inventory::{
    domain::{Group, GroupId, GroupName, NodeId},
    ports::{InventoryStore, InventoryTransaction},
};
use std::sync::Arc;
use tracing::info;

/// Group membership service.
pub struct GroupService<S>
where
    S: InventoryStore,
{
    store: Arc<S>,
}

impl<S> Clone for GroupService<S>
where
    S: InventoryStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> GroupService<S>
where
    S: InventoryStore,
{
    /// Creates a new group service.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an empty group at version zero.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name and store errors.
    pub async fn create_group(
        &self,
        name: &str,
        policy: impl Into<String>,
    ) -> InventoryServiceResult<Group> {
        let group_name = GroupName::new(name)?;
        let group_policy = policy.into();
        let group = self
            .store
            .in_transaction(move |tx| {
                Ok::<_, InventoryServiceError>(tx.insert_group(&group_name, &group_policy)?)
            })
            .await?;
        info!(group_id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    /// Adds nodes to a group. Returns the number of new memberships.
    ///
    /// The group's own version advances when it is active and anything
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::NotFound`] for an unknown group or
    /// node.
    pub async fn add_group_nodes(
        &self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryServiceResult<u64> {
        let members = node_ids.to_vec();
        self.store
            .in_transaction(move |tx| {
                let group = load_group(tx, group_id)?;
                let added = tx.insert_group_memberships(group_id, &members)?;
                if added > 0 {
                    propagate_group_change(tx, &group)?;
                }
                Ok(added)
            })
            .await
    }

    /// Removes nodes from a group. Returns the number of memberships removed.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::NotFound`] for an unknown group.
    pub async fn remove_group_nodes(
        &self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryServiceResult<u64> {
        let members = node_ids.to_vec();
        self.store
            .in_transaction(move |tx| {
                let group = load_group(tx, group_id)?;
                let removed = tx.delete_group_memberships(group_id, &members)?;
                if removed > 0 {
                    propagate_group_change(tx, &group)?;
                }
                Ok(removed)
            })
            .await
    }

    /// Returns group `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Store`] when the lookup fails.
    pub async fn find_group(&self, id: GroupId) -> InventoryServiceResult<Option<Group>> {
        self.store
            .in_transaction(move |tx| Ok::<_, InventoryServiceError>(tx.find_group(id)?))
            .await
    }

    /// Returns the member node identifiers of group `id`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::NotFound`] for an unknown group.
    pub async fn group_nodes(&self, id: GroupId) -> InventoryServiceResult<Vec<NodeId>> {
        self.store
            .in_transaction(move |tx| {
                load_group(tx, id)?;
                Ok(tx.group_node_ids(id)?)
            })
            .await
    }
}

fn load_group(tx: &mut dyn InventoryTransaction, id: GroupId) -> InventoryServiceResult<Group> {
    tx.find_group(id)?
        .ok_or_else(|| InventoryServiceError::not_found(format!("group {id}")))
}
