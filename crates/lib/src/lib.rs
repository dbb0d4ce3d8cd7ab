//! sitevault-lib: content-addressed release storage for static websites
//!
//! This crate provides:
//! - `manifest`: the bundle manifest model and its validation
//! - `bundle`: tar bundles that are verified before anything is trusted
//! - `blob`: a deduplicating store of file contents keyed by hash
//! - `release`: per-environment release directories, promotion between
//!   environments, rollback and atomic activation
//! - `db`: the metadata store holding websites, environments and releases

pub mod blob;
pub mod bundle;
pub mod consts;
pub mod ctx;
pub mod db;
pub mod gc;
pub mod manifest;
pub mod platform;
pub mod release;
pub mod util;
