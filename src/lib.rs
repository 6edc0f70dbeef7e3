//! Node inventory: control-plane bookkeeping for a proxy configuration.
//!
//! This crate stores proxy nodes, the subscriptions that feed them, the
//! groups that select among them and the singleton system record of the
//! running configuration. Every mutation that could affect the running
//! configuration advances the versions of the dependent groups atomically
//! with the mutation, so the reconciliation process never serves a stale
//! configuration.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types and validation with no infrastructure dependencies
//! - **Ports**: Transactional store and link parser traits
//! - **Adapters**: `PostgreSQL`, in-memory and URI link parser implementations
//!
//! # Modules
//!
//! - [`inventory`]: Nodes, subscriptions, groups and version propagation
//! - [`cursor`]: Opaque pagination cursors and page types
//! - [`config`]: Configuration loading from TOML or the environment
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod cursor;
pub mod inventory;
pub mod telemetry;
