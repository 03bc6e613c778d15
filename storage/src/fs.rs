use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::{StorageAdapter, StorageError, StorageResult};

/// File-backed storage keeping one file per key under a root directory.
///
/// Writes go through a sibling temporary file followed by a rename, so a
/// concurrent reader of the same key sees either the old value or the new
/// one, never a torn write.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open the default per-user store for `app`, under the platform's local
    /// data directory (for example `~/.local/share/<app>` on Linux).
    ///
    /// # Errors
    /// Returns an error if no user data directory is available or it cannot
    /// be created.
    pub fn in_user_data(app: &str) -> StorageResult<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no user data directory available",
            ))
        })?;
        Self::new(base.join(app))
    }

    /// The directory this store keeps its files in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        // Keys double as file names; reject anything that would escape the
        // root directory.
        if key.is_empty()
            || key
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'))
        {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

impl StorageAdapter for FsStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        // Appended, not substituted: keys may contain dots, and replacing an
        // extension would make `a.json` and `a.tmp` contend for one path.
        let tmp = self.root.join(format!("{key}.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("wrote {key} ({} bytes)", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
