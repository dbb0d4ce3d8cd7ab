//! End-to-end tests driving the sitevault binary against an isolated data
//! directory.

mod bundle_tests;
mod common;
mod gc_tests;
mod release_tests;
