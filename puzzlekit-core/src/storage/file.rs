//! Filesystem-backed slot store: one file per slot inside a directory.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::error::{StorageError, StorageResult};
use super::traits::SlotStore;

/// Slot store that keeps each slot as `<dir>/<slot>.json`.
///
/// Writes go to a temporary sibling file which is then renamed over the slot,
/// so a crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    root: PathBuf,
}

impl FileSlotStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the slot files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing slot `name`.
    #[must_use]
    pub fn slot_path(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.slot_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(format!("reading {}", path.display()), err)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| {
            StorageError::io(format!("creating {}", self.root.display()), err)
        })?;

        let path = self.slot_path(name);
        let tmp_path = path.with_extension("json.tmp");
        let write_tmp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()
        };
        write_tmp()
            .map_err(|err| StorageError::io(format!("writing {}", tmp_path.display()), err))?;
        fs::rename(&tmp_path, &path)
            .map_err(|err| StorageError::io(format!("replacing {}", path.display()), err))
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.slot_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(format!("deleting {}", path.display()), err)),
        }
    }
}
