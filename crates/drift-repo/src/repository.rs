//! Repository discovery, bootstrap and working-tree operations.

use crate::config::RepoConfig;
use crate::index::{Index, IndexEntry};
use crate::status::StatusReport;
use crate::task::TaskGroup;
use crate::{RepoError, Result};
use drift_storage::{
    build_tree, Commit, ObjectId, ObjectStore, ObjectType, RefStore, Signature, StorageError,
    BLOB_MODE, DEFAULT_BRANCH,
};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the marker directory at the repository root.
pub const MARKER_DIR: &str = ".drift";

const OBJECTS_DIR: &str = "objects";
const INDEX_FILE: &str = "index";
const CONFIG_FILE: &str = "config";

/// Subdirectories created under the marker directory at init.
const LAYOUT: &[&str] = &["objects", "refs/heads", "peers", "sync", "log"];

/// The outcome of staging a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Files whose index entry was added or replaced.
    pub staged: usize,
    /// Files that were already staged with the same content.
    pub unchanged: usize,
    /// Entries dropped because their file no longer exists.
    pub removed: usize,
}

/// What HEAD currently designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// Branch name, or `None` when HEAD is detached.
    pub branch: Option<String>,
    /// The commit HEAD resolves to, or `None` before the first commit.
    pub commit: Option<ObjectId>,
}

/// A Drift repository rooted at a working-tree directory.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    marker: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
    index: Index,
}

impl Repository {
    /// Initializes a new repository in `root`.
    pub async fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let marker = root.join(MARKER_DIR);
        if marker.exists() {
            return Err(RepoError::AlreadyInitialized(root.to_path_buf()));
        }

        tokio::fs::create_dir(&marker).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                RepoError::AlreadyInitialized(root.to_path_buf())
            } else {
                RepoError::io("create directory", &marker)(e)
            }
        })?;

        let mut tasks = TaskGroup::new();
        for sub in LAYOUT {
            let dir = marker.join(sub);
            tasks.spawn(async move {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(RepoError::io("create directory", dir))
            });
        }
        tasks.join_all().await?;

        let config = RepoConfig::with_peer_id(uuid::Uuid::new_v4().to_string());
        config.save(&marker.join(CONFIG_FILE))?;

        RefStore::open(&marker).set_head_symbolic(&format!("refs/heads/{}", DEFAULT_BRANCH))?;
        Index::open(marker.join(INDEX_FILE)).clear()?;

        info!(path = %root.display(), peer_id = %config.peer.id, "Initialized empty Drift repository");
        Self::open(root)
    }

    /// Finds the repository containing `start` by walking up its ancestors.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        let absolute = absolutize(start)?;
        let root = absolute
            .ancestors()
            .find(|dir| dir.join(MARKER_DIR).is_dir())
            .ok_or_else(|| RepoError::NotARepository(start.to_path_buf()))?;
        Self::open(root)
    }

    /// Opens the repository rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let marker = root.join(MARKER_DIR);
        if !marker.is_dir() {
            return Err(RepoError::NotARepository(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(RepoError::io("resolve", root))?;
        let marker = root.join(MARKER_DIR);

        let objects_dir = marker.join(OBJECTS_DIR);
        if !objects_dir.is_dir() {
            return Err(RepoError::MissingObjectsDir(objects_dir));
        }

        let index = Index::open(marker.join(INDEX_FILE));
        index.ensure_exists()?;

        Ok(Self {
            objects: ObjectStore::open(objects_dir),
            refs: RefStore::open(&marker),
            index,
            root,
            marker,
        })
    }

    /// Returns the working-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the marker directory.
    pub fn marker_dir(&self) -> &Path {
        &self.marker
    }

    /// Returns the object store.
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Returns the reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Returns the index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Returns the directory holding peer bookkeeping.
    pub fn peers_dir(&self) -> PathBuf {
        self.marker.join("peers")
    }

    /// Loads the repository configuration.
    pub fn config(&self) -> Result<RepoConfig> {
        RepoConfig::load(&self.marker.join(CONFIG_FILE))
    }

    /// Saves the repository configuration.
    pub fn save_config(&self, config: &RepoConfig) -> Result<()> {
        config.save(&self.marker.join(CONFIG_FILE))
    }

    /// Stages a file, or every file under a directory.
    ///
    /// Each file's blob is written to the object store before the index is
    /// updated. Entries that cannot be read while walking are skipped.
    ///
    /// Index entries under `path` whose file is gone are dropped, as are
    /// entries that a staged path now runs through (a file replaced by a
    /// directory). `path` itself may be missing if something under it is
    /// still indexed, which records its removal.
    pub fn add(&self, path: impl AsRef<Path>) -> Result<AddReport> {
        let path = path.as_ref();
        let (target, exists) = self.resolve(path)?;
        if !target.starts_with(&self.root) {
            return Err(RepoError::OutsideRepository(path.to_path_buf()));
        }
        let prefix = self.relative_path(&target);

        let mut entries = Vec::new();
        if exists {
            for file in self.walk_files(&target) {
                let Some(rel) = self.relative_path(&file) else {
                    warn!(path = %file.display(), "Skipping path that is not valid UTF-8");
                    continue;
                };
                let content = std::fs::read(&file).map_err(RepoError::io("read", &file))?;
                let id = self.objects.write_blob(content)?;
                debug!(path = %rel, id = %id, "Wrote blob");
                entries.push(IndexEntry::new(BLOB_MODE, id, rel));
            }
        }

        let staged_paths: HashSet<String> = entries.iter().map(|e| e.path.clone()).collect();
        let total = entries.len();
        let update = self.index.update(entries, |entry| {
            let gone = prefix
                .as_deref()
                .is_some_and(|prefix| is_under(&entry.path, prefix))
                && !self.root.join(&entry.path).is_file();
            let shadowed = staged_paths
                .iter()
                .any(|staged| is_under(staged, &entry.path) && *staged != entry.path);
            !(gone || shadowed)
        })?;

        if !exists && update.removed == 0 {
            return Err(RepoError::PathNotFound(path.to_path_buf()));
        }

        info!(
            path = %path.display(),
            staged = update.staged,
            unchanged = total - update.staged,
            removed = update.removed,
            "Staged files"
        );
        Ok(AddReport {
            staged: update.staged,
            unchanged: total - update.staged,
            removed: update.removed,
        })
    }

    /// Canonicalizes `path`. A missing path is resolved through its parent
    /// and reported with `false`.
    fn resolve(&self, path: &Path) -> Result<(PathBuf, bool)> {
        let abs = absolutize(path)?;
        match abs.canonicalize() {
            Ok(target) => Ok((target, true)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let target = abs
                    .parent()
                    .zip(abs.file_name())
                    .and_then(|(parent, name)| parent.canonicalize().ok().map(|p| p.join(name)))
                    .ok_or_else(|| RepoError::PathNotFound(path.to_path_buf()))?;
                Ok((target, false))
            }
            Err(e) => Err(RepoError::io("resolve", path)(e)),
        }
    }

    /// Compares the index with the working tree.
    pub fn status(&self) -> Result<StatusReport> {
        let mut indexed: HashMap<String, (ObjectId, bool)> = self
            .index
            .load()?
            .into_iter()
            .map(|entry| (entry.path, (entry.id, false)))
            .collect();

        let mut report = StatusReport {
            branch: self.refs.current_branch()?,
            ..StatusReport::default()
        };

        for file in self.walk_files(&self.root) {
            let Some(rel) = self.relative_path(&file) else {
                continue;
            };
            match indexed.get_mut(&rel) {
                Some((staged_id, seen)) => {
                    *seen = true;
                    let content = std::fs::read(&file).map_err(RepoError::io("read", &file))?;
                    if ObjectId::hash_object(ObjectType::Blob, &content) == *staged_id {
                        report.staged.push(rel);
                    } else {
                        report.modified.push(rel);
                    }
                }
                None => report.untracked.push(rel),
            }
        }

        report.deleted = indexed
            .into_iter()
            .filter(|(_, (_, seen))| !seen)
            .map(|(path, _)| path)
            .collect();
        report.sort();
        Ok(report)
    }

    /// Records the staged snapshot as a commit and advances HEAD to it.
    ///
    /// The index is cleared only after the ref update succeeds.
    pub fn commit(&self, message: &str) -> Result<ObjectId> {
        let entries = self.index.load()?;
        if entries.is_empty() {
            return Err(RepoError::NothingToCommit);
        }

        let tree = build_tree(
            entries.iter().map(IndexEntry::to_tree_entry).collect(),
            &self.objects,
        )?;

        let config = self.config()?;
        let (name, email) = config.identity();
        let signature = Signature::now(name, email);
        let commit = Commit {
            tree,
            author: signature.clone(),
            committer: signature,
            message: message.trim_end_matches('\n').to_string(),
        };
        let id = self.objects.write(ObjectType::Commit, commit.to_bytes())?;

        self.refs.advance_head(id)?;
        self.index.clear()?;

        info!(commit = %id, tree = %tree, files = entries.len(), "Created commit");
        Ok(id)
    }

    /// Returns what HEAD designates.
    pub fn head(&self) -> Result<Head> {
        Ok(Head {
            branch: self.refs.current_branch()?,
            commit: self.refs.resolve_head()?,
        })
    }

    /// Reads the commit HEAD resolves to, if any.
    pub fn head_commit(&self) -> Result<Option<Commit>> {
        let Some(id) = self.refs.resolve_head()? else {
            return Ok(None);
        };
        let object = self.objects.read(&id)?;
        if object.object_type != ObjectType::Commit {
            return Err(StorageError::InvalidObject(format!(
                "HEAD points at a {} object: {}",
                object.object_type, id
            ))
            .into());
        }
        Ok(Some(Commit::parse(&object.data)?))
    }

    /// Walks regular files under `start`, skipping the marker directory and
    /// entries that cannot be read.
    fn walk_files<'a>(&'a self, start: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        WalkDir::new(start)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.file_name() != MARKER_DIR)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(move |path| !path.starts_with(&self.marker))
    }

    /// Returns the `/`-separated path of `path` relative to the root.
    fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        Some(parts.join("/"))
    }
}

/// Returns true if `path` is `prefix` or lies below it. The empty prefix
/// is the repository root.
fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().map_err(RepoError::io("read current directory", "."))?;
        Ok(cwd.join(path))
    }
}
