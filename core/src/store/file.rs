//! Directory-backed key-value store: one JSON document per key.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::config::{APP_NAME, APP_ORGANISATION, APP_QUALIFIER};

use super::{KeyValueStore, Result};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store directory at {}", root.display()))?;
        Ok(Self { root, lock: Mutex::new(()) })
    }

    /// Store rooted in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let root = ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("state"))
            .ok_or_else(|| anyhow!("unable to resolve application data directory"))?;
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'));
        if !valid {
            return Err(anyhow!("invalid store key `{key}`"));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let _guard = self.lock.lock();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(anyhow::Error::from(err).context(format!("reading {}", path.display()))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self.lock.lock();
        let mut temp = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("allocating temp file in {}", self.root.display()))?;
        temp.write_all(value.as_bytes()).with_context(|| format!("writing {}", path.display()))?;
        temp.flush()?;
        temp.persist(&path).map_err(|err| anyhow::Error::from(err.error))?;
        Ok(())
    }
}
