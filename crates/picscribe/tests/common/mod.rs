//! Shared test utilities for picscribe integration tests.

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
