// Token record persistence

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use super::types::CredentialSet;
use crate::error::StoreError;

/// File-backed credential store with an in-process cache.
///
/// The file is the source of truth across restarts; the cache is a shortcut
/// that `load` fills and `save` overwrites. Clones share the same cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    cache: Arc<RwLock<Option<CredentialSet>>>,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cached credential set, without touching the file
    pub async fn cached(&self) -> Option<CredentialSet> {
        self.cache.read().await.clone()
    }

    /// Read the record from disk.
    ///
    /// Returns `Ok(None)` when the record is missing, is not valid JSON, or has
    /// no access token. A usable record also replaces the cache.
    pub async fn load(&self) -> Result<Option<CredentialSet>, StoreError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No token record at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };

        let set: CredentialSet = match serde_json::from_str(&data) {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable token record {}: {}",
                    self.path.display(),
                    e
                );
                return Ok(None);
            }
        };

        if !set.has_access_token() {
            tracing::warn!(
                "Ignoring token record without access_token: {}",
                self.path.display()
            );
            return Ok(None);
        }

        *self.cache.write().await = Some(set.clone());
        Ok(Some(set))
    }

    /// Persist the full credential set, replacing any previous record.
    ///
    /// The cache is updated first and stays updated even if the write fails.
    /// Each save writes its own temp file (mode 0600 on Unix) next to the
    /// record and renames it into place, so readers never see a partial
    /// record, even with concurrent saves.
    pub async fn save(&self, set: &CredentialSet) -> Result<(), StoreError> {
        *self.cache.write().await = Some(set.clone());

        let data =
            serde_json::to_vec_pretty(set).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || write_atomically(&path, &data)).await {
            Ok(written) => written?,
            Err(e) => {
                return Err(StoreError::Write {
                    path: self.path.clone(),
                    message: format!("write task failed: {}", e),
                })
            }
        }

        tracing::debug!("Token record saved to {}", self.path.display());
        Ok(())
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let write_error = |e: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_error)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tokens-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_error)?;
    tmp.write_all(data).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(write_error)?;
    }

    // A failed persist drops the temp file, which removes it
    tmp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}
