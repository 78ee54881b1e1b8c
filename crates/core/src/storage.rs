//! Persisted storage for offline data.
//!
//! A [`Folder`] is a directory holding one JSON document per name. Saving and
//! loading are blocking; a single process is expected to write.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors raised by [`Folder`] operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed data at {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("nothing stored at {path}")]
    Missing { path: PathBuf },
}

/// A directory-like storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    path: PathBuf,
}

impl Folder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory if needed.
    ///
    /// Returns `true` if the directory did not exist before the call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn create(&self) -> Result<bool, StorageError> {
        if self.path.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(true)
    }

    /// Returns `true` if something has been saved under `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.file(name).is_file()
    }

    /// Serializes `value` under `name`, overwriting any previous content.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        self.create()?;
        let path = self.file(name);
        let text = serde_json::to_string(value).map_err(|source| StorageError::Serde {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| StorageError::Io { path, source })
    }

    /// Deserializes the value saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Missing`] if nothing was saved, or an I/O or
    /// deserialization error.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, StorageError> {
        let path = self.file(name);
        if !path.is_file() {
            return Err(StorageError::Missing { path });
        }
        let text = fs::read_to_string(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StorageError::Serde { path, source })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}.json"))
    }
}

/// Named storage locations sharing a common root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folders {
    root: PathBuf,
    entries: BTreeMap<String, Folder>,
}

impl Folders {
    pub const BASIS: &'static str = "basis";
    pub const REDUCED_OPERATORS: &'static str = "reduced_operators";
    pub const ERROR_ESTIMATION: &'static str = "error_estimation";
    pub const TRAINING_SET: &'static str = "training_set";
    pub const TESTING_SET: &'static str = "testing_set";
    pub const POST_PROCESSING: &'static str = "post_processing";

    /// Creates the well-known folders below `root` without touching disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut folders = Self {
            root: root.into(),
            entries: BTreeMap::new(),
        };
        for name in [
            Self::BASIS,
            Self::REDUCED_OPERATORS,
            Self::ERROR_ESTIMATION,
            Self::TRAINING_SET,
            Self::TESTING_SET,
            Self::POST_PROCESSING,
        ] {
            folders.add(name);
        }
        folders
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers `name` below the root and returns its folder.
    pub fn add(&mut self, name: &str) -> &Folder {
        let path = self.root.join(name);
        self.entries
            .entry(name.to_owned())
            .or_insert_with(|| Folder::new(path))
    }

    /// Returns the folder registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Folder> {
        self.entries.get(name)
    }

    /// Returns the folder for `name`, registered or not.
    #[must_use]
    pub fn folder(&self, name: &str) -> Folder {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or_else(|| Folder::new(self.root.join(name)))
    }

    /// Returns a new set of folders rooted at `root/name`.
    #[must_use]
    pub fn nested(&self, name: &str) -> Self {
        Self::new(self.root.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_reports_first_creation_only() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let folder = Folder::new(dir.path().join("offline"));

        assert!(folder.create().expect("should create"));
        assert!(!folder.create().expect("should reuse"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let folder = Folder::new(dir.path());

        folder.save("values", &vec![1.0, 2.5]).expect("should save");

        assert!(folder.exists("values"));
        let values: Vec<f64> = folder.load("values").expect("should load");
        assert_eq!(values, vec![1.0, 2.5]);
    }

    #[test]
    fn loading_a_missing_name_fails() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let folder = Folder::new(dir.path());

        let result: Result<Vec<f64>, _> = folder.load("absent");

        assert!(matches!(result, Err(StorageError::Missing { .. })));
    }

    #[test]
    fn well_known_folders_share_the_root() {
        let folders = Folders::new("cache");
        let basis = folders.get(Folders::BASIS).expect("basis is registered");

        assert_eq!(basis.path(), Path::new("cache/basis"));
        assert_eq!(folders.nested("dual").root(), Path::new("cache/dual"));
    }
}
