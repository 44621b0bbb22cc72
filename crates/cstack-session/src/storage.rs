//! Object storage for stack files
//!
//! Stacks live as named objects in a bucket. Two implementations:
//! - [`MemoryStorage`]: process-local map, for tests and scratch sessions
//! - [`FsStorage`]: one directory per bucket under a root directory

use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Bucket/object store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Object contents, or `None` when it does not exist
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or overwrite an object
    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Remove an object; removing a missing object succeeds
    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StorageError>;
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an object already stored
    #[must_use]
    pub fn with_object(self, bucket: &str, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.put(bucket, name, data.into());
        self
    }

    /// Store an object synchronously
    pub fn put(&self, bucket: &str, name: &str, data: Vec<u8>) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), data);
    }

    /// Object contents
    #[must_use]
    pub fn object(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.buckets.read().get(bucket)?.get(name).cloned()
    }

    /// Object names in a bucket, sorted
    #[must_use]
    pub fn names(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.object(bucket, name))
    }

    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.put(bucket, name, data);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        if let Some(objects) = self.buckets.write().get_mut(bucket) {
            objects.remove(name);
        }
        Ok(())
    }
}

/// Filesystem storage: `<root>/<bucket>/<name>`
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Storage rooted at a directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, bucket: &str, name: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for part in [bucket, name] {
            let relative = Path::new(part);
            let valid = !part.is_empty()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !valid {
                return Err(StorageError::InvalidName(format!("{bucket}/{name}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

fn io_error(name: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        name: name.to_string(),
        source,
    }
}

#[async_trait]
impl ObjectStorage for FsStorage {
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path(bucket, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(name)(err)),
        }
    }

    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        let path = self.path(bucket, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(name))?;
        }
        debug!(path = %path.display(), bytes = data.len(), "Writing object");
        tokio::fs::write(&path, data).await.map_err(io_error(name))
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        let path = self.path(bucket, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(name)(err)),
        }
    }
}
