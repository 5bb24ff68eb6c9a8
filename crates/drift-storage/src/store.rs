//! Loose object store on disk.

use crate::object::header;
use crate::{write_atomic, Object, ObjectId, ObjectType, Result, StorageError};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Content-addressed object store rooted at an `objects` directory.
///
/// Objects are sharded by the first two hex characters of their digest.
/// The store holds no in-memory state, so any number of handles may point
/// at the same directory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    /// Opens the store rooted at `dir`. The directory is not created.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the objects directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the on-disk path for an object.
    pub fn path_for(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Checks if an object exists.
    pub fn exists(&self, id: &ObjectId) -> bool {
        self.path_for(id).is_file()
    }

    /// Stores a payload of the given type and returns its ID.
    ///
    /// Writing content that is already stored is a no-op.
    pub fn write(&self, object_type: ObjectType, data: impl Into<Bytes>) -> Result<ObjectId> {
        self.put(&Object::new(object_type, data))
    }

    /// Stores a blob and returns its ID.
    pub fn write_blob(&self, content: impl Into<Bytes>) -> Result<ObjectId> {
        self.write(ObjectType::Blob, content)
    }

    /// Stores an object and returns its ID.
    pub fn put(&self, object: &Object) -> Result<ObjectId> {
        if self.exists(&object.id) {
            debug!(id = %object.id, "Object already stored");
            return Ok(object.id);
        }
        let compressed = Self::compress(object)?;
        self.persist(&object.id, &compressed)?;
        debug!(
            id = %object.id,
            kind = %object.object_type,
            size = object.size(),
            "Stored object"
        );
        Ok(object.id)
    }

    /// Stores an object received in compressed form, verifying it first.
    pub fn write_raw(&self, compressed: &[u8]) -> Result<ObjectId> {
        let object = Self::decompress(compressed)?;
        if !self.exists(&object.id) {
            self.persist(&object.id, compressed)?;
        }
        Ok(object.id)
    }

    /// Retrieves an object by ID.
    pub fn read(&self, id: &ObjectId) -> Result<Object> {
        let compressed = self.read_raw(id)?;
        let object = Self::decompress(&compressed)?;
        if object.id != *id {
            return Err(StorageError::Corruption {
                id: id.to_hex(),
                reason: format!("content hashes to {}", object.id),
            });
        }
        Ok(object)
    }

    /// Returns the stored (compressed) bytes of an object.
    pub fn read_raw(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.path_for(id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(id.to_hex()))
            }
            Err(e) => Err(StorageError::io("read", path)(e)),
        }
    }

    /// Lists all object IDs in the store.
    ///
    /// Entries that are not valid object files (such as in-flight temp
    /// files) are ignored.
    pub fn list(&self) -> Result<Vec<ObjectId>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir).min_depth(2).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable object entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let shard = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str());
            let rest = entry.file_name().to_str();
            if let (Some(shard), Some(rest)) = (shard, rest) {
                if let Ok(id) = ObjectId::from_hex(&format!("{}{}", shard, rest)) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Compresses an object's header and payload using zlib.
    pub fn compress(object: &Object) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&header(object.object_type, object.data.len()))
            .and_then(|_| encoder.write_all(&object.data))
            .map_err(|e| StorageError::InvalidObject(format!("compression failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| StorageError::InvalidObject(format!("compression failed: {}", e)))
    }

    /// Decompresses stored bytes back into an object.
    pub fn decompress(compressed: &[u8]) -> Result<Object> {
        let mut decoder = ZlibDecoder::new(compressed);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| StorageError::InvalidObject(format!("decompression failed: {}", e)))?;

        // Parse header: "type size\0data"
        let null_pos = decompressed.iter().position(|&b| b == 0).ok_or_else(|| {
            StorageError::InvalidObject("missing null byte in header".to_string())
        })?;

        let header = std::str::from_utf8(&decompressed[..null_pos])
            .map_err(|_| StorageError::InvalidObject("header is not utf-8".to_string()))?;
        let (kind, size) = header
            .split_once(' ')
            .ok_or_else(|| StorageError::InvalidObject(format!("invalid header: {}", header)))?;

        let object_type = ObjectType::parse(kind)?;
        let size: usize = size
            .parse()
            .map_err(|_| StorageError::InvalidObject(format!("invalid size: {}", size)))?;

        let data = Bytes::from(decompressed.split_off(null_pos + 1));
        if data.len() != size {
            return Err(StorageError::InvalidObject(format!(
                "header declares {} bytes, found {}",
                size,
                data.len()
            )));
        }
        Ok(Object::new(object_type, data))
    }

    fn persist(&self, id: &ObjectId, compressed: &[u8]) -> Result<()> {
        let path = self.path_for(id);
        if let Some(shard) = path.parent() {
            std::fs::create_dir_all(shard).map_err(StorageError::io("create directory", shard))?;
        }
        match write_atomic(&path, compressed) {
            // Lost a race with a concurrent writer of the same content.
            Err(_) if path.is_file() => Ok(()),
            other => other,
        }
    }
}
