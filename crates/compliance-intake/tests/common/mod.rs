//! Shared test utilities for compliance-intake integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated session over temp files and an in-memory queue
//! - `GatedTransport`, a transport whose transfers can be held and released
//! - Builder patterns for configurations and queue entries

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{wait_until, GatedTransport, TestHarness};
