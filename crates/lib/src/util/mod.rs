//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, relative path
//! sanitization and test helpers.

pub(crate) mod flock;
pub mod hash;
pub mod relpath;

#[cfg(test)]
pub mod testutil;
