//! Shared test utilities for jobhound integration tests.
//!
//! This module provides:
//! - `TestHarness` for building aggregators over an isolated database
//! - Builder patterns for postings and configurations

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
