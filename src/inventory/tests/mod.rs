//! Unit and service tests for the inventory.

mod domain_tests;
