//! Temp-file-then-rename writes.

use crate::{Result, StorageError};
use std::io::Write;
use std::path::Path;

/// Writes `contents` to `path` so that readers see either the old file or
/// the complete new one.
///
/// The data is written to a temporary file in the destination directory,
/// flushed to disk and then renamed over `path`. The parent directory must
/// already exist.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::InvalidObject(format!("no parent: {}", path.display())))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .map_err(StorageError::io("create temp file in", dir))?;
    tmp.write_all(contents)
        .map_err(StorageError::io("write", tmp.path().to_path_buf()))?;
    tmp.as_file()
        .sync_all()
        .map_err(StorageError::io("sync", tmp.path().to_path_buf()))?;
    tmp.persist(path)
        .map_err(|e| StorageError::io("rename into", path)(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("HEAD");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(&dir.path().join("index"), b"").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("index")]);
    }

    #[test]
    fn missing_parent_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_atomic(&dir.path().join("missing").join("file"), b"x");
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }
}
