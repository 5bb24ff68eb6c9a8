//! Reference management on disk.

use crate::{write_atomic, ObjectId, Result, StorageError};
use std::path::{Path, PathBuf};

/// Name of the branch HEAD points at in a fresh repository.
pub const DEFAULT_BRANCH: &str = "main";

const HEAD: &str = "HEAD";
const SYMBOLIC_PREFIX: &str = "ref: ";
const HEADS_PREFIX: &str = "refs/heads/";

/// A reference (branch or HEAD).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Parses the contents of a reference file.
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.trim();
        match content.strip_prefix(SYMBOLIC_PREFIX) {
            Some(target) => {
                validate_ref_name(target.trim())?;
                Ok(Self::Symbolic(target.trim().to_string()))
            }
            None => ObjectId::from_hex(content)
                .map(Self::Direct)
                .map_err(|_| StorageError::InvalidRef(format!("malformed ref: {:?}", content))),
        }
    }

    /// Serializes the reference into file contents.
    pub fn to_file_contents(&self) -> String {
        match self {
            Self::Direct(id) => id.to_hex(),
            Self::Symbolic(target) => format!("{}{}\n", SYMBOLIC_PREFIX, target),
        }
    }

    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }
}

/// Reference files stored under a repository's marker directory.
#[derive(Debug, Clone)]
pub struct RefStore {
    dir: PathBuf,
}

impl RefStore {
    /// Opens the reference store rooted at the marker directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the path of the HEAD file.
    pub fn head_path(&self) -> PathBuf {
        self.dir.join(HEAD)
    }

    /// Reads HEAD.
    pub fn head(&self) -> Result<Reference> {
        let path = self.head_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => Reference::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::RefNotFound(HEAD.to_string()))
            }
            Err(e) => Err(StorageError::io("read", path)(e)),
        }
    }

    /// Points HEAD at a branch ref such as `refs/heads/main`.
    pub fn set_head_symbolic(&self, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        write_atomic(
            &self.head_path(),
            Reference::Symbolic(target.to_string())
                .to_file_contents()
                .as_bytes(),
        )
    }

    /// Detaches HEAD at a commit.
    pub fn set_head_detached(&self, id: ObjectId) -> Result<()> {
        write_atomic(&self.head_path(), id.to_hex().as_bytes())
    }

    /// Reads a ref such as `refs/heads/main`. Returns `None` if it does not
    /// exist yet.
    pub fn get(&self, name: &str) -> Result<Option<ObjectId>> {
        let path = self.ref_path(name)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => match Reference::parse(&content)? {
                Reference::Direct(id) => Ok(Some(id)),
                Reference::Symbolic(_) => Err(StorageError::InvalidRef(format!(
                    "nested symbolic refs not supported: {}",
                    name
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io("read", path)(e)),
        }
    }

    /// Sets a ref to point to an object, creating parent directories.
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::io("create directory", parent))?;
        }
        write_atomic(&path, target.to_hex().as_bytes())
    }

    /// Resolves HEAD to a commit, if any commit exists yet.
    pub fn resolve_head(&self) -> Result<Option<ObjectId>> {
        match self.head()? {
            Reference::Direct(id) => Ok(Some(id)),
            Reference::Symbolic(target) => self.get(&target),
        }
    }

    /// Gets the current branch name (if HEAD is symbolic).
    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(match self.head()? {
            Reference::Symbolic(target) => target.strip_prefix(HEADS_PREFIX).map(str::to_string),
            Reference::Direct(_) => None,
        })
    }

    /// Advances whatever HEAD designates to `id`.
    ///
    /// A symbolic HEAD moves its branch; a detached HEAD is overwritten.
    pub fn advance_head(&self, id: ObjectId) -> Result<()> {
        match self.head()? {
            Reference::Symbolic(target) => self.set(&target, id),
            Reference::Direct(_) => self.set_head_detached(id),
        }
    }

    /// Lists branch names under `refs/heads`, sorted.
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let heads = self.dir.join(HEADS_PREFIX);
        if !heads.is_dir() {
            return Ok(Vec::new());
        }
        let mut branches: Vec<String> = walkdir::WalkDir::new(&heads)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.file_name().to_string_lossy().starts_with(".tmp-"))
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&heads).ok()?;
                Some(rel.to_str()?.replace('\\', "/"))
            })
            .collect();
        branches.sort();
        Ok(branches)
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(name
            .split('/')
            .fold(self.dir.clone(), |path, segment| path.join(segment)))
    }
}

/// Ref names live under `refs/` and may not escape the marker directory.
fn validate_ref_name(name: &str) -> Result<()> {
    let valid = name.starts_with("refs/")
        && name
            .split('/')
            .all(|s| !s.is_empty() && s != "." && s != ".." && !s.contains('\\'))
        && !Path::new(name).is_absolute();
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidRef(format!("invalid ref name: {}", name)))
    }
}
