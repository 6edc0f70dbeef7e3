//! Proxy node inventory with group version propagation.
//!
//! Nodes come from subscriptions or manual imports and are deduplicated by
//! name within their subscription scope. Groups select nodes through
//! membership edges; while a configuration is running, any removal of a
//! member node advances the versions of the active groups that referenced
//! it, in the same transaction as the removal. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
