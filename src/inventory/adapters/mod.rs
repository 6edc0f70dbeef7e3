//! Adapter implementations for the inventory ports.

pub mod link_parser;
pub mod memory;
pub mod postgres;

pub use link_parser::UriLinkParser;
pub use memory::InMemoryInventoryStore;
pub use postgres::{InventoryPgPool, PostgresInventoryStore, build_pool};
