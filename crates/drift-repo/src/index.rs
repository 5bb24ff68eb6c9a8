//! The staging area.
//!
//! The index file holds one line per staged file,
//! `"<mode> <digest> <relative-path>"`, in staging order. Paths are
//! `/`-separated and unique: re-staging a path replaces its line in place.

use crate::{RepoError, Result};
use drift_storage::{ObjectId, TreeEntry};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// File mode.
    pub mode: String,
    /// Digest of the staged blob.
    pub id: ObjectId,
    /// Path relative to the repository root.
    pub path: String,
}

impl IndexEntry {
    /// Creates an entry.
    pub fn new(mode: impl Into<String>, id: ObjectId, path: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            id,
            path: path.into(),
        }
    }

    /// Parses an index line. Returns `None` for malformed lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ' ');
        let mode = parts.next()?;
        let id = ObjectId::from_hex(parts.next()?).ok()?;
        let path = parts.next().filter(|p| !p.is_empty())?;
        Some(Self::new(mode, id, path))
    }

    /// Converts the entry into a blob tree entry named by its path.
    pub fn to_tree_entry(&self) -> TreeEntry {
        TreeEntry::blob(self.mode.clone(), self.id, self.path.clone())
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.mode, self.id, self.path)
    }
}

/// Counts of index lines touched by [`Index::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexUpdate {
    /// Entries added or replaced.
    pub staged: usize,
    /// Entries dropped.
    pub removed: usize,
}

/// Handle to a repository's index file.
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
}

impl Index {
    /// Opens the index at `path`. The file need not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the index file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty index file if none exists.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            self.clear()?;
        }
        Ok(())
    }

    /// Loads the staged entries in order.
    ///
    /// Malformed lines are skipped. If a path occurs on several lines the
    /// last one wins, keeping the position of the first.
    pub fn load(&self) -> Result<Vec<IndexEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepoError::io("read", self.path.clone())(e)),
        };

        let mut entries: Vec<IndexEntry> = Vec::new();
        for line in content.lines().filter(|l| !l.is_empty()) {
            match IndexEntry::parse(line) {
                Some(entry) => {
                    upsert(&mut entries, entry);
                }
                None => warn!(line = %line, "Skipping malformed index line"),
            }
        }
        Ok(entries)
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    /// Stages one entry. Returns false if the identical entry was already
    /// staged.
    pub fn stage(&self, entry: IndexEntry) -> Result<bool> {
        Ok(self.stage_all(std::iter::once(entry))? == 1)
    }

    /// Stages several entries with a single rewrite of the index file.
    /// Returns how many entries changed the index.
    pub fn stage_all(&self, new_entries: impl IntoIterator<Item = IndexEntry>) -> Result<usize> {
        Ok(self.update(new_entries, |_| true)?.staged)
    }

    /// Drops every existing entry for which `keep` returns false, then
    /// stages `new_entries`. The file is rewritten once, and only if
    /// something changed.
    pub fn update(
        &self,
        new_entries: impl IntoIterator<Item = IndexEntry>,
        mut keep: impl FnMut(&IndexEntry) -> bool,
    ) -> Result<IndexUpdate> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|e| keep(e));

        let mut update = IndexUpdate {
            staged: 0,
            removed: before - entries.len(),
        };
        for entry in new_entries {
            if upsert(&mut entries, entry) {
                update.staged += 1;
            }
        }
        if update.staged > 0 || update.removed > 0 {
            self.save(&entries)?;
        }
        Ok(update)
    }

    /// Removes all entries.
    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }

    fn save(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        drift_storage::write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }
}

/// Inserts or replaces the entry for `entry.path`. Returns true if the
/// index changed.
fn upsert(entries: &mut Vec<IndexEntry>, entry: IndexEntry) -> bool {
    match entries.iter_mut().find(|e| e.path == entry.path) {
        Some(existing) if *existing == entry => false,
        Some(existing) => {
            *existing = entry;
            true
        }
        None => {
            entries.push(entry);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 32])
    }

    fn temp_index() -> (tempfile::TempDir, Index) {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path().join("index"));
        (dir, index)
    }

    #[test]
    fn test_stage_and_load() {
        let (_dir, index) = temp_index();
        index.stage(IndexEntry::new("100644", id(1), "b.txt")).unwrap();
        index.stage(IndexEntry::new("100644", id(2), "a/c.txt")).unwrap();

        let entries = index.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "b.txt");
        assert_eq!(entries[1].path, "a/c.txt");
    }

    #[test]
    fn test_file_format() {
        let (_dir, index) = temp_index();
        index.stage(IndexEntry::new("100644", id(1), "dir/file name.txt")).unwrap();

        let content = std::fs::read_to_string(index.path()).unwrap();
        assert_eq!(content, format!("100644 {} dir/file name.txt\n", id(1)));
        assert_eq!(index.load().unwrap()[0].path, "dir/file name.txt");
    }

    #[test]
    fn test_restaging_identical_entry_is_noop() {
        let (_dir, index) = temp_index();
        assert!(index.stage(IndexEntry::new("100644", id(1), "a")).unwrap());
        assert!(!index.stage(IndexEntry::new("100644", id(1), "a")).unwrap());

        let content = std::fs::read_to_string(index.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_restaging_changed_path_replaces_entry() {
        let (_dir, index) = temp_index();
        index.stage(IndexEntry::new("100644", id(1), "a")).unwrap();
        index.stage(IndexEntry::new("100644", id(2), "b")).unwrap();
        index.stage(IndexEntry::new("100644", id(3), "a")).unwrap();

        let entries = index.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], IndexEntry::new("100644", id(3), "a"));
    }

    #[test]
    fn test_load_tolerates_duplicates_and_garbage() {
        let (_dir, index) = temp_index();
        let content = format!(
            "100644 {} a\nnot a valid line\n\n100644 {} a\n100644 {} b\n",
            id(1),
            id(2),
            id(3)
        );
        std::fs::write(index.path(), content).unwrap();

        let entries = index.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, id(2));
        assert_eq!(entries[1].path, "b");
    }

    #[test]
    fn test_clear() {
        let (_dir, index) = temp_index();
        index.stage(IndexEntry::new("100644", id(1), "a")).unwrap();
        index.clear().unwrap();

        assert!(index.is_empty().unwrap());
        assert!(index.path().exists());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let (_dir, index) = temp_index();
        assert!(index.load().unwrap().is_empty());
        index.ensure_exists().unwrap();
        assert!(index.path().exists());
    }

    #[test]
    fn test_update_drops_and_stages_in_one_pass() {
        let (_dir, index) = temp_index();
        index
            .stage_all([
                IndexEntry::new("100644", id(1), "a"),
                IndexEntry::new("100644", id(2), "keep"),
            ])
            .unwrap();

        let update = index
            .update([IndexEntry::new("100644", id(3), "a/b")], |e| e.path != "a")
            .unwrap();
        assert_eq!(update, IndexUpdate { staged: 1, removed: 1 });

        let paths: Vec<_> = index.load().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["keep", "a/b"]);
    }

    #[test]
    fn test_update_without_changes_leaves_file_alone() {
        let (_dir, index) = temp_index();
        index.stage(IndexEntry::new("100644", id(1), "a")).unwrap();
        let before = std::fs::metadata(index.path()).unwrap().modified().unwrap();

        let update = index
            .update([IndexEntry::new("100644", id(1), "a")], |_| true)
            .unwrap();
        assert_eq!(update, IndexUpdate::default());
        assert_eq!(std::fs::metadata(index.path()).unwrap().modified().unwrap(), before);
    }
}
