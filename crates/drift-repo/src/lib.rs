//! # Drift Repo
//!
//! Working-tree repository operations for Drift.
//!
//! A repository is a directory containing the `.drift` marker directory:
//!
//! ```text
//! .drift/
//! ├── HEAD           ref: refs/heads/main
//! ├── config         [user] / [peer] sections (TOML)
//! ├── index          "<mode> <digest> <path>" per staged file
//! ├── objects/       content-addressed objects, sharded by digest prefix
//! ├── refs/heads/    branch tips
//! ├── peers/         known peer addresses
//! ├── sync/
//! └── log/
//! ```
//!
//! Index mutation and commit assume a single writer per repository.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod index;
mod repository;
mod status;
mod task;

pub use config::{ConfigKey, PeerConfig, RepoConfig, UserConfig};
pub use error::{RepoError, Result};
pub use index::{Index, IndexEntry, IndexUpdate};
pub use repository::{AddReport, Head, Repository, MARKER_DIR};
pub use status::StatusReport;
pub use task::TaskGroup;
