//! Staged layer files on the local filesystem.

use std::path::{Path, PathBuf};

use clairscan_core::error::Result;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

/// Fixed filename every staged layer is written to inside its digest
/// directory. Part of the staging URL contract.
pub const LAYER_FILE_NAME: &str = "layer.tar";

/// Directory name under the system temp dir used by default.
const STAGING_DIR_NAME: &str = "clairscan-layers";

/// Digest-addressed staging directory.
///
/// Layout: `<root>/<digest>/layer.tar`. Files live for one run; the serving
/// loop reads them concurrently, which is safe because every write is
/// flushed and closed before the digest's URL is ever referenced.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a staging area rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a staging area under the system temp dir.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join(STAGING_DIR_NAME))
    }

    /// Staging root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging root if absent.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Path a digest's layer file is (or would be) staged at.
    pub fn file_path(&self, digest: &str) -> PathBuf {
        self.root.join(digest).join(LAYER_FILE_NAME)
    }

    /// Stream a layer blob into `<root>/<digest>/layer.tar`.
    ///
    /// The digest directory is created if absent (idempotent). The file is
    /// flushed and synced before the path is returned, so the returned path
    /// is immediately servable.
    pub async fn save_file(
        &self,
        digest: &str,
        mut blob: impl AsyncRead + Unpin,
    ) -> Result<PathBuf> {
        let dir = self.root.join(digest);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(LAYER_FILE_NAME);
        let mut file = tokio::fs::File::create(&path).await?;
        let written = tokio::io::copy(&mut blob, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        debug!(digest = %digest, bytes = written, path = %path.display(), "Staged layer");
        Ok(path)
    }

    /// Remove a staged layer file, leaving its directory in place.
    /// An already-absent file is not an error.
    pub async fn delete_file(&self, digest: &str) -> Result<()> {
        let path = self.file_path(digest);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(digest = %digest, "Removed staged layer");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_file_writes_bytes() {
        let temp = TempDir::new().unwrap();
        let area = StagingArea::new(temp.path());

        let path = area
            .save_file("sha256:abc123", &b"layer bytes"[..])
            .await
            .unwrap();

        assert_eq!(path, temp.path().join("sha256:abc123").join(LAYER_FILE_NAME));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"layer bytes");
    }

    #[tokio::test]
    async fn test_save_file_is_idempotent_over_existing_directory() {
        let temp = TempDir::new().unwrap();
        let area = StagingArea::new(temp.path());

        area.save_file("sha256:abc", &b"first"[..]).await.unwrap();
        let path = area.save_file("sha256:abc", &b"second"[..]).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_delete_file_keeps_directory() {
        let temp = TempDir::new().unwrap();
        let area = StagingArea::new(temp.path());

        let path = area.save_file("sha256:abc", &b"data"[..]).await.unwrap();
        area.delete_file("sha256:abc").await.unwrap();

        assert!(!path.exists());
        assert!(temp.path().join("sha256:abc").is_dir());
    }

    #[tokio::test]
    async fn test_delete_absent_file_is_ok() {
        let temp = TempDir::new().unwrap();
        let area = StagingArea::new(temp.path());
        area.delete_file("sha256:never-staged").await.unwrap();
    }
}
