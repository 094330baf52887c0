//! Directory-backed checkpoint storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::error::CheckpointError;
use super::store::CheckpointStore;

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling that is synced and then renamed over the
/// target, so readers see either the old or the new checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Use `dir` for checkpoints, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory holding the checkpoints.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a key is stored in.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, CheckpointError> {
        if !is_valid_key(key) {
            return Err(CheckpointError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names: ASCII letters, digits, `-`, `_` and `.`, not
/// starting with a dot.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Persist the rename itself by syncing the directory entry.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), CheckpointError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}.json.tmp"));

        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &path).await
        }
        .await;
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        path = %tmp.display(),
                        error = %cleanup,
                        "stale checkpoint temp file left behind"
                    );
                }
            }
            return Err(e.into());
        }

        sync_dir(&self.dir).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
