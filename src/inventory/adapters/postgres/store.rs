//! `PostgreSQL` store running each unit of work in one database transaction.

use super::transaction::PgInventoryTransaction;
use crate::config::InventoryConfig;
use crate::inventory::ports::{InventoryStore, InventoryStoreError, InventoryTransaction};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use tokio_util::sync::CancellationToken;

/// `PostgreSQL` connection pool type used by the inventory store.
pub type InventoryPgPool = Pool<ConnectionManager<PgConnection>>;

/// Builds a connection pool from configuration.
///
/// # Errors
///
/// Returns [`InventoryStoreError::Persistence`] when the pool cannot be
/// created.
pub fn build_pool(config: &InventoryConfig) -> Result<InventoryPgPool, InventoryStoreError> {
    Pool::builder()
        .max_size(config.pool_max_size)
        .build(ConnectionManager::<PgConnection>::new(&config.database_url))
        .map_err(InventoryStoreError::persistence)
}

/// `PostgreSQL`-backed inventory store.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: InventoryPgPool,
}

impl PostgresInventoryStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: InventoryPgPool) -> Self {
        Self { pool }
    }
}

enum TransactionAbort<E> {
    Work(E),
    Database(DieselError),
}

impl<E> From<DieselError> for TransactionAbort<E> {
    fn from(err: DieselError) -> Self {
        Self::Database(err)
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn InventoryTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<InventoryStoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        // Dropping this future cancels the token; the worker then refuses
        // further statements and rolls back instead of committing.
        let _cancel_on_drop = cancel.drop_guard();

        tokio::task::spawn_blocking(move || {
            let mut pooled = pool
                .get()
                .map_err(|err| E::from(InventoryStoreError::persistence(err)))?;
            let connection: &mut PgConnection = &mut pooled;
            connection
                .transaction::<T, TransactionAbort<E>, _>(|conn| {
                    let mut tx = PgInventoryTransaction::new(conn, &worker_cancel);
                    let value = work(&mut tx).map_err(TransactionAbort::Work)?;
                    tx.ensure_active()
                        .map_err(|err| TransactionAbort::Work(E::from(err)))?;
                    Ok(value)
                })
                .map_err(|abort| match abort {
                    TransactionAbort::Work(err) => err,
                    TransactionAbort::Database(err) => {
                        E::from(InventoryStoreError::persistence(err))
                    }
                })
        })
        .await
        .map_err(|err| E::from(InventoryStoreError::persistence(err)))?
    }
}
