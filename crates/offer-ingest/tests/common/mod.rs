//! Shared test utilities for offer-ingest integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a full pipeline to scripted oracles and an in-memory store
//! - Builders for submissions and attachments

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
