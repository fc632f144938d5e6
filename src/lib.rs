//! media-vault - Transactional object storage for user media
//!
//! The underlying blob store only guarantees per-object consistency. This
//! crate layers compound operations with all-or-nothing semantics on top:
//! - Atomic batch upload with compensating deletes
//! - Batch delete with exact partial-failure reporting
//! - Folder move/copy that is never left half-done
//! - Replace with backup-and-restore rollback
//! - Swappable backends (local filesystem, hosted storage API)
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod object_store;
pub mod path;
pub mod txn;
pub mod validate;
pub mod vault;

use config::Config;
use vault::Vault;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub vault: Vault,
}
