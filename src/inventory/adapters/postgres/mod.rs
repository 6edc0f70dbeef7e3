//! `PostgreSQL` adapter for inventory persistence.

mod models;
mod schema;
mod store;
mod transaction;

pub use store::{InventoryPgPool, PostgresInventoryStore, build_pool};
