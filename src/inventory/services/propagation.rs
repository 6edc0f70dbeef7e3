//! Group version propagation.
//!
//! A running configuration consumes group versions. Whenever nodes that
//! belong to active groups change membership, those groups must advance by
//! exactly one inside the transaction that made the change, so a
//! reconciliation pass reading after commit always observes the bump.

use crate::inventory::{
    domain::{Group, NodeId},
    ports::{InventoryStoreResult, InventoryTransaction},
};
use tracing::debug;

/// Bumps every active group referencing any of `node_ids`.
///
/// Runs inside the caller's transaction and returns the number of groups
/// bumped. Nothing is bumped while the system is stopped.
///
/// # Errors
///
/// Returns the store error unchanged; the caller must roll back.
pub fn propagate_node_change(
    tx: &mut dyn InventoryTransaction,
    node_ids: &[NodeId],
) -> InventoryStoreResult<u64> {
    let system = tx.get_or_create_system()?;
    if !system.running || node_ids.is_empty() {
        return Ok(0);
    }
    let bumped = tx.increment_group_versions_for_nodes(system.id, node_ids)?;
    debug!(nodes = node_ids.len(), groups = bumped, "propagated node change");
    Ok(bumped)
}

/// Bumps `group` when it belongs to the running system's active set.
///
/// # Errors
///
/// Returns the store error unchanged; the caller must roll back.
pub fn propagate_group_change(
    tx: &mut dyn InventoryTransaction,
    group: &Group,
) -> InventoryStoreResult<u64> {
    let system = tx.get_or_create_system()?;
    if !system.running || group.system_id != Some(system.id) {
        return Ok(0);
    }
    tx.increment_group_version(group.id)
}
