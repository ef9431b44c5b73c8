//! Directory-backed record store.
//!
//! Each [`StoragePath`] maps to `<root>/<segment>/.../<last>.xml`. Writes
//! stage the new text in a temporary file next to the destination and then
//! rename it into place, so a crash mid-write leaves either the old document
//! or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::path::StoragePath;
use crate::traits::RecordStore;

/// File extension of every record document.
pub const RECORD_EXTENSION: &str = "xml";

/// A [`RecordStore`] that keeps one file per record under a root directory.
#[derive(Debug)]
pub struct DirectoryRecordStore {
    root: PathBuf,
}

impl DirectoryRecordStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(StoreError::NotADirectory(root));
        }
        debug!(root = %root.display(), "record store opened");
        Ok(Self { root })
    }

    /// Filesystem location of a record.
    pub fn file_path(&self, path: &StoragePath) -> PathBuf {
        let mut file = self.root.clone();
        if let Some((last, dirs)) = path.segments().split_last() {
            for dir in dirs {
                file.push(dir);
            }
            file.push(format!("{last}.{RECORD_EXTENSION}"));
        }
        file
    }

    fn storage_path_for(&self, file: &Path) -> Option<StoragePath> {
        if file.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            return None;
        }
        let relative = file.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Option<Vec<String>> = relative
            .components()
            .map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect();
        StoragePath::new(segments?).ok()
    }
}

impl RecordStore for DirectoryRecordStore {
    fn read(&self, path: &StoragePath) -> StoreResult<Option<String>> {
        let file = self.file_path(path);
        let bytes = match fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(%path, len = bytes.len(), "record read");
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StoreError::NotText(file))
    }

    fn write(&self, path: &StoragePath, text: &str) -> StoreResult<()> {
        let file = self.file_path(path);
        let parent = file.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(text.as_bytes())?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged.persist(&file).map_err(|e| StoreError::Io(e.error))?;

        debug!(%path, len = text.len(), "record written");
        Ok(())
    }

    fn delete(&self, path: &StoragePath) -> StoreResult<bool> {
        match fs::remove_file(self.file_path(path)) {
            Ok(()) => {
                debug!(%path, "record deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &StoragePath) -> StoreResult<bool> {
        Ok(self.file_path(path).is_file())
    }

    fn list(&self) -> StoreResult<Vec<StoragePath>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| {
                StoreError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk loop")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(path) = self.storage_path_for(entry.path()) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> StoragePath {
        StoragePath::parse(text).unwrap()
    }

    #[test]
    fn write_creates_tag_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();

        store.write(&path("CUS/1"), "<isis/>").unwrap();
        assert!(dir.path().join("CUS").join("1.xml").is_file());
        assert_eq!(store.read(&path("CUS/1")).unwrap().as_deref(), Some("<isis/>"));
    }

    #[test]
    fn read_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        assert!(store.read(&path("CUS/404")).unwrap().is_none());
        assert!(!store.exists(&path("CUS/404")).unwrap());
    }

    #[test]
    fn write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        store.write(&path("oid"), "<number>1F</number>").unwrap();
        store.write(&path("oid"), "<number>2</number>").unwrap();
        assert_eq!(
            store.read(&path("oid")).unwrap().as_deref(),
            Some("<number>2</number>")
        );
    }

    #[test]
    fn delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        store.write(&path("CUS/1"), "x").unwrap();
        assert!(store.delete(&path("CUS/1")).unwrap());
        assert!(!store.delete(&path("CUS/1")).unwrap());
        assert!(!dir.path().join("CUS").join("1.xml").exists());
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        store.write(&path("CUS/2"), "2").unwrap();
        store.write(&path("CUS/1"), "1").unwrap();
        store.write(&path("org.example.Customer"), "i").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(
            listed,
            vec![path("CUS/1"), path("CUS/2"), path("org.example.Customer")]
        );
    }

    #[test]
    fn reopen_sees_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirectoryRecordStore::open(dir.path()).unwrap();
            store.write(&path("EMP/9"), "persisted").unwrap();
        }
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        assert_eq!(store.read(&path("EMP/9")).unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn non_utf8_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.xml"), [0xff, 0xfe, 0x00]).unwrap();
        let err = store.read(&path("bad")).unwrap_err();
        assert!(matches!(err, StoreError::NotText(_)));
    }

    #[test]
    fn open_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        assert!(DirectoryRecordStore::open(&file).is_err());
    }
}
