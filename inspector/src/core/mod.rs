//! Deterministic, pure logic shared by the selection tracker.
//!
//! Core modules must be free of side effects. They operate on the
//! collaborator traits and return plain values suitable for tests.

pub mod classifier;
pub mod connectivity;
pub mod types;
