//! JSON token cache shared by every client id
//!
//! Layout: `{"tokens": {"<client_id>": {...}}}`, two-space indented, mode
//! `0600`. Writes go to `<file>.tmp` and are renamed over the real file while
//! holding the sidecar lock, so readers only ever see a complete document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use authgate_core::TokenStore;
use authgate_domain::{AuthGateError, Result, TokenRecord, TokenStoreFile};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::file_lock::{FileLock, LockOptions};
use crate::errors::InfraError;

/// [`TokenStore`] backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    lock_options: LockOptions,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock_options: LockOptions::default() }
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Parse the whole cache document.
    pub async fn read_all(&self) -> Result<TokenStoreFile> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(AuthGateError::NotFound(format!(
                    "token file {} does not exist",
                    self.path.display()
                )))
            }
            Err(err) => return Err(InfraError::from(err).into()),
        };

        serde_json::from_str(&contents).map_err(|err| {
            AuthGateError::Parse(format!("failed to parse token file {}: {err}", self.path.display()))
        })
    }

    /// Existing document, or an empty one when missing or unreadable.
    async fn read_for_merge(&self) -> TokenStoreFile {
        match self.read_all().await {
            Ok(existing) => existing,
            Err(AuthGateError::NotFound(_)) => TokenStoreFile::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token_store.discarding_unreadable_file");
                TokenStoreFile::default()
            }
        }
    }

    async fn write_atomic(&self, document: &TokenStoreFile) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(document)
            .map_err(|err| AuthGateError::from(InfraError::from(err)))?;
        bytes.push(b'\n');

        let temp = self.temp_path();
        write_owner_only(&temp, &bytes).await.map_err(|err| {
            AuthGateError::Storage(format!("failed to write {}: {err}", temp.display()))
        })?;

        if let Err(rename_err) = fs::rename(&temp, &self.path).await {
            return Err(match fs::remove_file(&temp).await {
                Ok(()) => AuthGateError::Storage(format!(
                    "failed to rename {} to {}: {rename_err}",
                    temp.display(),
                    self.path.display()
                )),
                Err(cleanup_err) => AuthGateError::Storage(format!(
                    "failed to rename {} to {}: {rename_err}; failed to remove temp file: {cleanup_err}",
                    temp.display(),
                    self.path.display()
                )),
            });
        }
        Ok(())
    }
}

async fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }

    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, client_id: &str) -> Result<TokenRecord> {
        let document = self.read_all().await?;
        if document.is_empty() {
            return Err(AuthGateError::NotFound(format!(
                "token file {} holds no tokens",
                self.path.display()
            )));
        }
        document
            .get(client_id)
            .cloned()
            .ok_or_else(|| AuthGateError::NotFound(format!("no tokens for client {client_id}")))
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        let lock = FileLock::acquire_with(&self.path, self.lock_options).await?;

        let mut document = self.read_for_merge().await;
        document.upsert(record.clone());
        let written = self.write_atomic(&document).await;

        let released = lock.release().await;
        written?;
        if let Err(err) = released {
            warn!(error = %err, "token_store.lock_release_failed");
        }

        info!(path = %self.path.display(), clients = document.len(), "token_store.saved");
        debug!(client_id = %record.client_id, "token_store.record_written");
        Ok(())
    }
}
