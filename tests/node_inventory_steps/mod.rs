//! Step definitions for node inventory behaviour scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
