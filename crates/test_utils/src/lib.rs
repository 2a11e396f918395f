//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! dealership ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built amounts, dates and identifiers
//! - `assertions`: Money assertions with readable failure messages
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use assertions::*;
pub use generators::*;
