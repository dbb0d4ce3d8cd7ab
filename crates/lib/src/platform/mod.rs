//! Platform-dependent locations.

pub mod paths;
