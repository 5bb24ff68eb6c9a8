//! Tree objects and the recursive tree builder.
//!
//! A tree payload is one line per entry, `<mode> <kind> <digest> <name>\n`,
//! sorted by name in byte order. Sorting before serialization makes a
//! tree's digest a pure function of the directory contents.

use crate::{ObjectId, ObjectStore, ObjectType, Result, StorageError};
use std::collections::BTreeMap;
use std::fmt;

/// Mode recorded for regular files.
pub const BLOB_MODE: &str = "100644";

/// Mode recorded for subdirectories.
pub const TREE_MODE: &str = "040000";

/// Kind of object a tree entry points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A file.
    Blob,
    /// A subdirectory.
    Tree,
}

impl EntryKind {
    /// Returns the string used in tree payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            _ => Err(StorageError::InvalidObject(format!(
                "unknown tree entry kind: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode, e.g. `100644`.
    pub mode: String,
    /// What the entry points to.
    pub kind: EntryKind,
    /// Digest of the referenced object.
    pub id: ObjectId,
    /// Entry name. When handed to [`build_tree`] this is a `/`-separated
    /// path relative to the tree root.
    pub name: String,
}

impl TreeEntry {
    /// Creates a blob entry.
    pub fn blob(mode: impl Into<String>, id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            kind: EntryKind::Blob,
            id,
            name: name.into(),
        }
    }
}

/// A parsed or to-be-written tree object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    /// Entries sorted by name.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates a tree, sorting the entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Self { entries }
    }

    /// Serializes the tree payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&format!("{} {} {} {}\n", e.mode, e.kind, e.id, e.name));
        }
        out.into_bytes()
    }

    /// Parses a tree payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| StorageError::InvalidObject("tree is not utf-8".to_string()))?;

        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let mut parts = line.splitn(4, ' ');
            let (Some(mode), Some(kind), Some(id), Some(name)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(StorageError::InvalidObject(format!(
                    "malformed tree line: {}",
                    line
                )));
            };
            entries.push(TreeEntry {
                mode: mode.to_string(),
                kind: EntryKind::parse(kind)?,
                id: ObjectId::from_hex(id)?,
                name: name.to_string(),
            });
        }
        Ok(Self { entries })
    }
}

/// Builds the tree hierarchy for a flat list of blob entries and returns
/// the root tree's digest.
///
/// Each entry's `name` is its path relative to the root. Entries are
/// grouped by their first path segment; every group becomes a subtree
/// written before its parent. Input order does not affect the result.
pub fn build_tree(entries: Vec<TreeEntry>, store: &ObjectStore) -> Result<ObjectId> {
    let mut files: BTreeMap<String, TreeEntry> = BTreeMap::new();
    let mut dirs: BTreeMap<String, Vec<TreeEntry>> = BTreeMap::new();

    for mut entry in entries {
        match entry.name.split_once('/') {
            None => {
                check_segment(&entry.name)?;
                files.insert(entry.name.clone(), entry);
            }
            Some((dir, rest)) => {
                check_segment(dir)?;
                let dir = dir.to_string();
                entry.name = rest.to_string();
                dirs.entry(dir).or_default().push(entry);
            }
        }
    }

    if let Some(name) = dirs.keys().find(|d| files.contains_key(*d)) {
        return Err(StorageError::InvalidObject(format!(
            "path is both a file and a directory: {}",
            name
        )));
    }

    let mut tree_entries: Vec<TreeEntry> = files.into_values().collect();
    for (name, children) in dirs {
        let id = build_tree(children, store)?;
        tree_entries.push(TreeEntry {
            mode: TREE_MODE.to_string(),
            kind: EntryKind::Tree,
            id,
            name,
        });
    }

    store.write(ObjectType::Tree, Tree::new(tree_entries).to_bytes())
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(StorageError::InvalidObject(format!(
            "invalid path segment: {:?}",
            segment
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn temp_store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path().join("objects"));
        std::fs::create_dir_all(store.dir()).unwrap();
        (dir, store)
    }

    fn blob(store: &ObjectStore, path: &str, content: &str) -> TreeEntry {
        let id = store.write_blob(content.as_bytes().to_vec()).unwrap();
        TreeEntry::blob(BLOB_MODE, id, path)
    }

    #[test]
    fn test_flat_tree_serialization() {
        let (_dir, store) = temp_store();
        let b = blob(&store, "b.txt", "b");
        let a = blob(&store, "a.txt", "a");

        let root = build_tree(vec![b.clone(), a.clone()], &store).unwrap();
        let tree = store.read(&root).unwrap();

        assert_eq!(tree.object_type, ObjectType::Tree);
        let expected = format!(
            "100644 blob {} a.txt\n100644 blob {} b.txt\n",
            a.id, b.id
        );
        assert_eq!(tree.data.as_ref(), expected.as_bytes());
    }

    #[test]
    fn test_nested_tree() {
        let (_dir, store) = temp_store();
        let entries = vec![
            blob(&store, "README", "readme"),
            blob(&store, "src/main.rs", "fn main() {}"),
            blob(&store, "src/util/mod.rs", "// util"),
        ];

        let root = build_tree(entries, &store).unwrap();
        let tree = Tree::parse(&store.read(&root).unwrap().data).unwrap();

        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entries[0].name, "README");
        assert_eq!(tree.entries[1].name, "src");
        assert_eq!(tree.entries[1].kind, EntryKind::Tree);
        assert_eq!(tree.entries[1].mode, TREE_MODE);

        let src = Tree::parse(&store.read(&tree.entries[1].id).unwrap().data).unwrap();
        let names: Vec<_> = src.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["main.rs", "util"]);
    }

    #[test]
    fn test_identical_directories_share_a_tree() {
        let (_dir, store) = temp_store();
        let entries = vec![
            blob(&store, "left/x", "same"),
            blob(&store, "right/x", "same"),
        ];

        let root = build_tree(entries, &store).unwrap();
        let tree = Tree::parse(&store.read(&root).unwrap().data).unwrap();

        assert_eq!(tree.entries[0].id, tree.entries[1].id);
    }

    #[test]
    fn test_sort_is_bytewise() {
        let (_dir, store) = temp_store();
        let entries = vec![
            blob(&store, "b", "1"),
            blob(&store, "B", "2"),
            blob(&store, "a", "3"),
        ];

        let root = build_tree(entries, &store).unwrap();
        let tree = Tree::parse(&store.read(&root).unwrap().data).unwrap();
        let names: Vec<_> = tree.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_file_and_directory_conflict() {
        let (_dir, store) = temp_store();
        let entries = vec![blob(&store, "a", "file"), blob(&store, "a/b", "nested")];
        assert!(matches!(
            build_tree(entries, &store),
            Err(StorageError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_rejects_empty_segments() {
        let (_dir, store) = temp_store();
        let entries = vec![blob(&store, "a//b", "x")];
        assert!(build_tree(entries, &store).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(Tree::parse(b"100644 blob only-three\n").is_err());
        assert!(Tree::parse(b"").unwrap().entries.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_tree_digest_ignores_input_order(
            files in proptest::collection::btree_map(
                "[a-c]{1,2}(/[a-c]{1,2}){0,2}",
                "[a-z]{0,8}",
                1..12,
            ),
            seed in any::<u64>(),
        ) {
            let (_dir, store) = temp_store();

            // Drop paths that would collide with a directory of the same name.
            let paths: Vec<_> = files.keys().cloned().collect();
            let files: Vec<_> = files
                .into_iter()
                .filter(|(p, _)| !paths.iter().any(|q| q.starts_with(&format!("{}/", p))))
                .collect();

            let entries: Vec<_> = files.iter().map(|(p, c)| blob(&store, p, c)).collect();
            let mut shuffled = entries.clone();
            let len = shuffled.len();
            for i in (1..len).rev() {
                let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }
            shuffled.reverse();

            let a = build_tree(entries, &store).unwrap();
            let b = build_tree(shuffled, &store).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
