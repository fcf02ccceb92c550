//! Integration test framework for nextgho
#![allow(missing_docs)]
//!
//! Shared fixtures and utilities for the cross-crate handover scenarios.
//!
//! # Components
//!
//! - [`test_fixtures`] - antenna rows, engine builders and scripted predictors
//! - [`test_utils`] - logging setup and timing helpers
//!
//! # Test Categories
//!
//! 1. **Handover scenarios** - immediate return, rate limiting, TTT, auto mode
//! 2. **Suppression properties** - guard on/off comparison, history invariants
//! 3. **Concurrent sessions** - many sessions, commit atomicity, decision task

pub mod test_fixtures;
pub mod test_utils;

pub use test_fixtures::{
    antenna_row, cell, engine_with_sessions, position_near, FailingPredictor, ScriptedPredictor,
    SlowPredictor, TestSession,
};
pub use test_utils::{
    init_test_logging, wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
