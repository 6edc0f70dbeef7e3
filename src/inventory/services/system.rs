//! Write interface of the reconciliation process onto the system record.

use super::error::{InventoryServiceError, InventoryServiceResult};
use crate::inventory::{
    domain::{RunSnapshot, System},
    ports::InventoryStore,
};
use mockable::Clock;
use std::sync::Arc;
use tracing::info;

/// System record service.
pub struct SystemService<S, C>
where
    S: InventoryStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for SystemService<S, C>
where
    S: InventoryStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> SystemService<S, C>
where
    S: InventoryStore,
    C: Clock + Send + Sync,
{
    /// Creates a new system service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Returns the system record, creating a stopped one on first access.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub async fn get_or_create(&self) -> InventoryServiceResult<System> {
        self.store
            .in_transaction(|tx| Ok::<_, InventoryServiceError>(tx.get_or_create_system()?))
            .await
    }

    /// Records that a configuration was applied with the groups in
    /// `snapshot` active.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::NotFound`] when the snapshot names
    /// an unknown group.
    pub async fn record_run(&self, mut snapshot: RunSnapshot) -> InventoryServiceResult<System> {
        snapshot.group_ids.sort_unstable();
        snapshot.group_ids.dedup();
        let now = self.clock.utc();
        let system = self
            .store
            .in_transaction(move |tx| {
                let system = tx.get_or_create_system()?;
                Ok::<_, InventoryServiceError>(tx.save_system_run(system.id, &snapshot, now)?)
            })
            .await?;
        info!(
            groups = system.running_group_ids.len(),
            group_version_sum = system.running_group_version_sum,
            "system running"
        );
        Ok(system)
    }

    /// Records that the running configuration was stopped.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub async fn record_stop(&self) -> InventoryServiceResult<System> {
        let system = self
            .store
            .in_transaction(|tx| {
                let system = tx.get_or_create_system()?;
                Ok::<_, InventoryServiceError>(tx.save_system_stop(system.id)?)
            })
            .await?;
        info!("system stopped");
        Ok(system)
    }
}
