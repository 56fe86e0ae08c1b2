//! Shared test utilities for teaser-analyst integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with temp directories and an in-memory database
//! - Stub collaborators (LLM client, text extractor, report renderer)

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
