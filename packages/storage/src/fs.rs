//! Local filesystem store.
//!
//! Writes go to a hidden temporary file next to the destination and are
//! then renamed over it, so readers never observe a half-written image.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{ArtifactStore, StorageError, validate_key};

/// Stores artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path a key maps to.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is unusable.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{file_name}.part"));

        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(e.into());
        }

        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path.display().to_string())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("images"));

        let location = store.put("a/b.jpg", b"first").await.unwrap();
        assert_eq!(tokio::fs::read(&location).await.unwrap(), b"first");

        store.put("a/b.jpg", b"second").await.unwrap();
        let path = store.path_for("a/b.jpg").unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn round_trips_binary_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let bytes: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let location = store.put("blob.bin", &bytes).await.unwrap();
        assert_eq!(tokio::fs::read(location).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(
            store.put("../evil.jpg", b"x").await,
            Err(StorageError::InvalidKey { .. })
        ));
    }
}
