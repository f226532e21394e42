use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tracing::debug;

use crate::error::StorageError;
use crate::hash;
use crate::record::FileRecord;

/// Flat directory of shared and downloaded files.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the storage root, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self::new(root);
        tokio::fs::create_dir_all(&store.root)
            .await
            .map_err(|source| StorageError::Io {
                name: store.root.display().to_string(),
                source,
            })?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a bare file name inside the root. Names come off the wire, so
    /// anything that could escape the root is rejected.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(&['/', '\\'][..]) => {
                Ok(self.root.join(name))
            }
            _ => Err(StorageError::InvalidName(name.to_string())),
        }
    }

    /// Hashes a stored file and describes it for the tracker.
    pub async fn describe(&self, name: &str) -> Result<FileRecord, StorageError> {
        let path = self.path_for(name)?;
        let (hash, size) = hash::hash_file(&path)
            .await
            .map_err(|e| io_error(name, e))?;
        Ok(FileRecord::new(name, hash, size))
    }

    pub async fn open_file(&self, name: &str) -> Result<File, StorageError> {
        let path = self.path_for(name)?;
        File::open(&path).await.map_err(|e| io_error(name, e))
    }

    /// Writes `data` under `name`, replacing any existing file.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| io_error(name, e))?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(path)
    }

    /// Regular files in the root, sorted by name.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let root_name = self.root.display().to_string();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(&root_name, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&root_name, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

fn io_error(name: &str, source: io::Error) -> StorageError {
    if source.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io {
            name: name.to_string(),
            source,
        }
    }
}
