//! Shared test utilities for billscan integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a pipeline onto a temp object store and in-memory SQLite
//! - Scripted stage executors and field builders

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{finished, reached, TestHarness};
