//! File-backed key-value store
//!
//! Each key maps to one `<safe-key>.json` file under the store directory.

use super::KeyValueStore;
use crate::utils::safe_filename;
use crate::Error;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Store that keeps one file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The directory holding the entry files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", safe_filename(key)))
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::Storage(format!("failed to {} {}: {}", action, path.display(), err))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| storage_error("create", &self.dir, e))?;

        let tmp_path = self.temp_path(key);
        let path = self.entry_path(key);

        let mut tmp_file =
            File::create(&tmp_path).map_err(|e| storage_error("create", &tmp_path, e))?;
        tmp_file
            .write_all(value.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| storage_error("write", &tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &path).map_err(|e| storage_error("replace", &path, e))
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }
}
