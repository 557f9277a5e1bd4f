//! Shared test utilities for gitca integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated model artifacts and config files
//! - `ScriptedLoader` for deterministic, observable inference engines

pub mod harness;
pub mod scripted;

pub use harness::{wait_for_state, TestHarness};
pub use scripted::{Probe, ScriptedLoader};
