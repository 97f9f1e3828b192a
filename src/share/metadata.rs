//! Per-share metadata record stored next to the share's files.
//!
//! The record lives at `<root>/<token>/.localshare.json`. Writes go to a
//! scratch file in the same directory and are renamed over the record, so a
//! concurrent reader sees either the old or the new record in full.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::blob_store::BlobStore;
use super::error::{ShareError, ShareResult};
use super::names::{ShareToken, RESERVED_PREFIX};

/// File name of the metadata record inside a share directory.
pub fn metadata_file_name() -> String {
    format!("{RESERVED_PREFIX}.json")
}

/// Persisted state of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub created_at: DateTime<Utc>,
    /// `None` means the share never expires on its own.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked: bool,
}

impl ShareRecord {
    /// A fresh, unrevoked record.
    pub fn new(created_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            created_at,
            expires_at,
            revoked: false,
        }
    }
}

/// Durable storage for share records, with per-token write serialization.
#[derive(Debug)]
pub struct MetadataStore {
    blobs: BlobStore,
    locks: LockMap,
}

type LockMap = Mutex<HashMap<ShareToken, Arc<AsyncMutex<()>>>>;

/// Held write lock of one share.
///
/// Releasing it drops every map entry that nobody holds or waits on.
#[derive(Debug)]
pub struct ShareLock<'a> {
    locks: &'a LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ShareLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // release first so our own reference no longer counts
        drop(self.guard.take());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl MetadataStore {
    pub fn new(blobs: BlobStore) -> Self {
        Self {
            blobs,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn record_path(&self, token: &ShareToken) -> PathBuf {
        self.blobs.share_dir(token).join(metadata_file_name())
    }

    /// Acquire the write lock for one token.
    ///
    /// Every mutation of a share's record (and its deletion) happens while
    /// holding this guard. Distinct tokens never contend.
    pub async fn lock(&self, token: &ShareToken) -> ShareLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(token.clone()).or_default())
        };
        ShareLock {
            locks: &self.locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of tokens with a lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Read a share's record.
    ///
    /// Returns `None` when no record exists or when it cannot be read or
    /// parsed; a bad record is logged and otherwise ignored.
    pub async fn read(&self, token: &ShareToken) -> ShareResult<Option<ShareRecord>> {
        let path = self.record_path(token);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(token = %token, error = %e, "Ignoring unreadable share metadata");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<ShareRecord>(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(token = %token, error = %e, "Ignoring corrupt share metadata");
                Ok(None)
            }
        }
    }

    /// Persist a record, replacing any existing one atomically.
    ///
    /// Callers that race with other writers must hold [`MetadataStore::lock`].
    pub async fn write(&self, token: &ShareToken, record: &ShareRecord) -> ShareResult<()> {
        let contents = serde_json::to_vec_pretty(record).map_err(|e| {
            ShareError::io(
                format!("failed to serialize metadata for {token}"),
                io::Error::other(e),
            )
        })?;

        let temp_path = self.blobs.temp_path(token, "meta");
        let result = write_and_rename(&temp_path, &self.record_path(token), &contents).await;
        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result.map_err(|e| {
            ShareError::io_for(token.as_str(), format!("failed to write metadata for {token}"), e)
        })?;

        debug!(token = %token, revoked = record.revoked, "Wrote share metadata");
        Ok(())
    }

    /// Read-modify-write a record under the token lock.
    ///
    /// A missing or corrupt record starts from a fresh default created now.
    pub async fn update<F>(&self, token: &ShareToken, mutate: F) -> ShareResult<ShareRecord>
    where
        F: FnOnce(&mut ShareRecord),
    {
        let _guard = self.lock(token).await;
        self.update_locked(token, mutate).await
    }

    /// Same as [`MetadataStore::update`] for callers already holding the lock.
    pub(crate) async fn update_locked<F>(
        &self,
        token: &ShareToken,
        mutate: F,
    ) -> ShareResult<ShareRecord>
    where
        F: FnOnce(&mut ShareRecord),
    {
        let mut record = self
            .read(token)
            .await?
            .unwrap_or_else(|| ShareRecord::new(Utc::now(), None));
        mutate(&mut record);
        self.write(token, &record).await?;
        Ok(record)
    }
}

async fn write_and_rename(temp: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp, target).await
}
