//! Working-tree status.

use serde::Serialize;

/// Comparison of the index against the working tree.
///
/// Every path appears in at most one of the lists. All lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Current branch, or `None` when HEAD is detached.
    pub branch: Option<String>,
    /// Indexed paths whose working copy matches the staged blob.
    pub staged: Vec<String>,
    /// Indexed paths whose working copy differs from the staged blob.
    pub modified: Vec<String>,
    /// Indexed paths missing from the working tree.
    pub deleted: Vec<String>,
    /// Working-tree files that are not in the index.
    pub untracked: Vec<String>,
}

impl StatusReport {
    /// Returns true if there are no modified, deleted, or untracked paths.
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty() && self.untracked.is_empty()
    }

    pub(crate) fn sort(&mut self) {
        self.staged.sort();
        self.modified.sort();
        self.deleted.sort();
        self.untracked.sort();
    }
}
