//! Shared test utilities for tradedoc integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp-dir SQLite database
//! - Scripted classifiers and a fault-injecting persistence wrapper

#![allow(dead_code)]

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{next_result, TestHarness, RESULT_TIMEOUT};
