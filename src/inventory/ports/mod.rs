//! Port contracts for the inventory.
//!
//! Ports define infrastructure-agnostic interfaces used by inventory
//! services.

pub mod link_parser;
pub mod store;

pub use link_parser::LinkParser;
pub use store::{
    InventoryStore, InventoryStoreError, InventoryStoreResult, InventoryTransaction, NodeScope,
};
