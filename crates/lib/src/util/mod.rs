//! Shared utilities.
//!
//! Path handling used across the crate and test helpers.

pub mod path;

#[cfg(test)]
pub mod testutil;
