//! Shared fixtures and test doubles for the integration tests.

pub mod fixtures;
pub mod mocks;
