//! Bundle manifest model.
//!
//! A manifest is the declarative list of resources in a bundle or release, each
//! naming one or more relative files and their content hashes. Manifests are
//! untrusted input and are always validated after decoding.

mod types;
mod validate;

pub use types::*;
pub use validate::{ManifestError, ResourceError};
