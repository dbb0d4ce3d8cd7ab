//! Release directories per website environment and the operations that move
//! them: import, promotion, rollback and activation. See [`layout`] for the
//! on-disk shape.

mod copy;
pub mod hashes;
pub mod id;
mod import;
pub mod layout;
pub mod lock;
pub mod metadata;
mod promote;
mod rollback;
mod stage;
pub mod symlink;
pub mod warnings;

pub use copy::{CopyError, CopyOnly, CopyStats, HardLinker, Linker, Strategy, copy_file, copy_release_content};
pub use hashes::HashMismatch;
pub use id::{ReleaseIdSource, UlidGenerator, default_id_source};
pub use import::{ImportError, ImportResult, import_directory};
pub use layout::EnvLayout;
pub use promote::{PromoteError, PromoteResult, Promoter, promote};
pub use rollback::{RollbackError, RollbackResult, activate_release, rollback};
pub use stage::StageError;
pub use symlink::{SymlinkError, read_current_target, switch_current_symlink};
