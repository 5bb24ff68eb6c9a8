//! Object storage for Drift.
//!
//! This crate provides content-addressed, compressed storage for repository
//! objects (blobs, trees, commits) together with the on-disk reference
//! files (`HEAD`, `refs/heads/*`) that point into it.
//!
//! Every object is identified by the SHA-256 digest of
//! `"<type> <len>\0" + payload`. Objects live under
//! `objects/<digest[0:2]>/<digest[2:]>` as zlib-compressed bytes and are
//! written through a temp-file-then-rename sequence, so a reader observes
//! either nothing or a complete object.

mod atomic;
mod commit;
mod error;
mod object;
mod refs;
mod store;
mod tree;

pub use atomic::write_atomic;
pub use commit::{Commit, Signature};
pub use error::StorageError;
pub use object::{Object, ObjectId, ObjectType};
pub use refs::{RefStore, Reference, DEFAULT_BRANCH};
pub use store::ObjectStore;
pub use tree::{build_tree, EntryKind, Tree, TreeEntry, BLOB_MODE, TREE_MODE};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
