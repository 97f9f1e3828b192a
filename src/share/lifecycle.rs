//! Share lifecycle: creation, validity checks, revocation and reclamation.
//!
//! [`ShareService`] is the only place that decides whether a share is alive.
//! The HTTP layer asks it before every read, and the reaper asks it before
//! every delete.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::blob_store::{ArchiveDownload, BlobStore, FileDownload, FileEntry};
use super::error::{ShareError, ShareResult};
use super::metadata::{MetadataStore, ShareRecord};
use super::names::{FileName, ShareToken};

/// Attempts at finding an unused token before giving up.
const CREATE_ATTEMPTS: usize = 3;

/// How long a new share stays available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareDuration {
    /// Never expires; only revocation ends it.
    #[default]
    Manual,
    /// Expires this many minutes after creation.
    Minutes(u32),
}

impl ShareDuration {
    /// Interpret a duration selector.
    ///
    /// `"manual"` and anything that is not a positive whole number of
    /// minutes fall back to [`ShareDuration::Manual`].
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("manual") {
            return Self::Manual;
        }
        match text.parse::<i64>() {
            Ok(n) if n > 0 => u32::try_from(n).map(Self::Minutes).unwrap_or(Self::Manual),
            _ => Self::Manual,
        }
    }

    /// Expiry time of a share created at `created_at`.
    pub fn expires_at(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Manual => None,
            Self::Minutes(n) => {
                created_at.checked_add_signed(chrono::Duration::minutes(i64::from(*n)))
            }
        }
    }
}

impl fmt::Display for ShareDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Minutes(n) => write!(f, "{n}"),
        }
    }
}

/// Outcome of a validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Revoked,
    Expired,
    NotFound,
}

impl Validity {
    /// Judge an existing share from its (possibly missing) record.
    ///
    /// A missing record means the share predates metadata and stays valid.
    pub fn of_record(record: Option<&ShareRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(r) if r.revoked => Self::Revoked,
            Some(r) if r.expires_at.is_some_and(|at| at < now) => Self::Expired,
            _ => Self::Valid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedShare {
    pub token: ShareToken,
    pub link: String,
    #[serde(rename = "files")]
    pub file_names: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Files of a live share, sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct ShareListing {
    pub files: Vec<FileEntry>,
    pub total_bytes: u64,
}

/// Administrative view of one stored share.
#[derive(Debug, Clone, Serialize)]
pub struct ShareSummary {
    pub token: ShareToken,
    pub record: Option<ShareRecord>,
    pub validity: Validity,
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Owner of share creation, validity and revocation.
#[derive(Debug)]
pub struct ShareService {
    blobs: BlobStore,
    metadata: MetadataStore,
    public_base_url: String,
}

impl ShareService {
    /// Open the service over a storage root, creating the root if needed.
    pub async fn open(
        storage_root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> ShareResult<Self> {
        let blobs = BlobStore::open(storage_root).await?;
        Ok(Self {
            metadata: MetadataStore::new(blobs.clone()),
            blobs,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Public link for a share.
    pub fn share_link(&self, token: &ShareToken) -> String {
        format!(
            "{}/share/{}",
            self.public_base_url.trim_end_matches('/'),
            token
        )
    }

    /// Write the initial record of a share whose directory already exists.
    pub async fn create(
        &self,
        token: &ShareToken,
        duration: ShareDuration,
    ) -> ShareResult<ShareRecord> {
        self.create_at(token, duration, Utc::now()).await
    }

    /// [`ShareService::create`] with an explicit creation time.
    pub async fn create_at(
        &self,
        token: &ShareToken,
        duration: ShareDuration,
        now: DateTime<Utc>,
    ) -> ShareResult<ShareRecord> {
        let record = ShareRecord::new(now, duration.expires_at(now));

        let _guard = self.metadata.lock(token).await;
        if !self.blobs.share_exists(token).await? {
            return Err(ShareError::not_found(token.as_str()));
        }
        self.metadata.write(token, &record).await?;

        info!(
            token = %token,
            duration = %duration,
            expires_at = ?record.expires_at,
            "Share created"
        );
        Ok(record)
    }

    /// Check whether a share can be read right now.
    pub async fn check_validity(&self, token: &ShareToken) -> ShareResult<Validity> {
        self.check_validity_at(token, Utc::now()).await
    }

    /// Check whether a share can be read at `now`.
    ///
    /// Revocation wins over expiry. A missing or corrupt record is valid.
    pub async fn check_validity_at(
        &self,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> ShareResult<Validity> {
        if !self.blobs.share_exists(token).await? {
            debug!(token = %token, "Validity check: not found");
            return Ok(Validity::NotFound);
        }
        let record = self.metadata.read(token).await?;
        let validity = Validity::of_record(record.as_ref(), now);
        debug!(token = %token, validity = validity.as_str(), "Validity check");
        Ok(validity)
    }

    /// Guard for every read path: fails unless the share is valid now.
    pub async fn ensure_valid(&self, token: &ShareToken) -> ShareResult<()> {
        match self.check_validity(token).await? {
            Validity::Valid => Ok(()),
            Validity::Revoked => Err(ShareError::Revoked {
                token: token.to_string(),
            }),
            Validity::Expired => Err(ShareError::Expired {
                token: token.to_string(),
            }),
            Validity::NotFound => Err(ShareError::not_found(token.as_str())),
        }
    }

    /// Withdraw a share. Idempotent; works on expired shares too.
    pub async fn revoke(&self, token: &ShareToken) -> ShareResult<ShareRecord> {
        if !self.blobs.share_exists(token).await? {
            return Err(ShareError::not_found(token.as_str()));
        }

        let _guard = self.metadata.lock(token).await;
        // the reaper may have purged it while we waited for the lock
        if !self.blobs.share_exists(token).await? {
            return Err(ShareError::not_found(token.as_str()));
        }
        let record = self
            .metadata
            .update_locked(token, |r| r.revoked = true)
            .await?;

        info!(token = %token, "Share revoked");
        Ok(record)
    }

    /// Whether a share should be reclaimed at `now`.
    ///
    /// Only a record that is revoked or past its expiry makes a share dead.
    /// Shares without a readable record are never reclaimed.
    pub async fn is_dead(&self, token: &ShareToken, now: DateTime<Utc>) -> bool {
        match self.metadata.read(token).await {
            Ok(Some(record)) => {
                record.revoked || record.expires_at.is_some_and(|at| now > at)
            }
            Ok(None) => false,
            Err(e) => {
                warn!(token = %token, error = %e, "Could not read metadata, keeping share");
                false
            }
        }
    }

    /// Delete a share and all its files.
    pub async fn purge(&self, token: &ShareToken) -> ShareResult<()> {
        let _guard = self.metadata.lock(token).await;
        self.blobs.delete_share_directory(token).await?;
        info!(token = %token, "Share deleted");
        Ok(())
    }

    /// Files of a valid share.
    pub async fn list_files(&self, token: &ShareToken) -> ShareResult<ShareListing> {
        self.ensure_valid(token).await?;

        let mut files: Vec<FileEntry> = self.blobs.list_files(token).try_collect().await?;
        files.sort_by(|a, b| a.name.cmp(&b.name));
        let total_bytes = files.iter().map(|f| f.size_bytes).sum();

        Ok(ShareListing { files, total_bytes })
    }

    /// Open one file of a valid share.
    pub async fn open_file(&self, token: &ShareToken, name: &FileName) -> ShareResult<FileDownload> {
        self.ensure_valid(token).await?;
        let download = self.blobs.read_file(token, name).await?;
        debug!(token = %token, file = %name, bytes = download.size_bytes, "Serving file");
        Ok(download)
    }

    /// Archive every file of a valid share.
    pub async fn bundle(&self, token: &ShareToken) -> ShareResult<ArchiveDownload> {
        self.ensure_valid(token).await?;
        self.blobs.bundle_as_archive(token).await
    }

    /// Begin a new share under a fresh token.
    pub async fn start_upload(&self) -> ShareResult<PendingUpload<'_>> {
        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let token = ShareToken::generate();
            match self.blobs.create_share_directory(&token).await {
                Ok(_) => return Ok(PendingUpload::new(self, token)),
                Err(e @ ShareError::AlreadyExists { .. }) => {
                    warn!(token = %token, "Token collision, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ShareError::AlreadyExists {
            token: String::new(),
        }))
    }

    /// Create a share from a list of named byte streams.
    pub async fn create_share<S, E>(
        &self,
        files: Vec<(FileName, S)>,
        duration: ShareDuration,
    ) -> ShareResult<CreatedShare>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut upload = self.start_upload().await?;
        for (name, content) in files {
            if let Err(e) = upload.add_file(&name, content).await {
                if let Err(cleanup) = upload.abort().await {
                    warn!(error = %cleanup, "Failed to clean up aborted upload");
                }
                return Err(e);
            }
        }
        upload.finish(duration).await
    }

    /// Every token present in storage.
    pub async fn known_tokens(&self) -> ShareResult<Vec<ShareToken>> {
        self.blobs.list_tokens().await
    }

    /// Summaries of every stored share, live or dead.
    pub async fn list_shares(&self) -> ShareResult<Vec<ShareSummary>> {
        let now = Utc::now();
        let mut summaries = Vec::new();

        for token in self.known_tokens().await? {
            let record = match self.metadata.read(&token).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(token = %token, error = %e, "Could not read metadata");
                    None
                }
            };
            let files: Vec<FileEntry> = match self.blobs.list_files(&token).try_collect().await {
                Ok(files) => files,
                // purged between listing tokens and listing files
                Err(ShareError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };

            summaries.push(ShareSummary {
                validity: Validity::of_record(record.as_ref(), now),
                record,
                file_count: files.len(),
                total_bytes: files.iter().map(|f| f.size_bytes).sum(),
                token,
            });
        }

        Ok(summaries)
    }
}

/// A share whose directory exists but whose record is not yet written.
///
/// Dropping it without calling [`PendingUpload::finish`] or
/// [`PendingUpload::abort`] (for example when the client disconnects)
/// schedules removal of the directory.
pub struct PendingUpload<'a> {
    service: &'a ShareService,
    token: ShareToken,
    file_names: Vec<String>,
    done: bool,
}

impl<'a> PendingUpload<'a> {
    fn new(service: &'a ShareService, token: ShareToken) -> Self {
        Self {
            service,
            token,
            file_names: Vec::new(),
            done: false,
        }
    }

    pub fn token(&self) -> &ShareToken {
        &self.token
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    /// Stream one file into the share.
    pub async fn add_file<S, E>(&mut self, name: &FileName, content: S) -> ShareResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let written = self
            .service
            .blobs
            .write_file(&self.token, name, content)
            .await?;
        if !self.file_names.iter().any(|n| n == name.as_str()) {
            self.file_names.push(name.to_string());
        }
        Ok(written)
    }

    /// Write the share's record and hand back its link.
    pub async fn finish(mut self, duration: ShareDuration) -> ShareResult<CreatedShare> {
        match self.service.create(&self.token, duration).await {
            Ok(record) => {
                self.done = true;
                info!(
                    token = %self.token,
                    files = ?self.file_names,
                    "Share link generated"
                );
                Ok(CreatedShare {
                    link: self.service.share_link(&self.token),
                    token: self.token.clone(),
                    file_names: std::mem::take(&mut self.file_names),
                    expires_at: record.expires_at,
                })
            }
            Err(e) => {
                self.done = true;
                if let Err(cleanup) = self.service.blobs.delete_share_directory(&self.token).await {
                    warn!(
                        token = %self.token,
                        error = %cleanup,
                        "Failed to remove share after its record could not be written"
                    );
                }
                Err(e)
            }
        }
    }

    /// Throw away everything written so far.
    pub async fn abort(mut self) -> ShareResult<()> {
        self.done = true;
        debug!(token = %self.token, "Upload aborted");
        self.service
            .blobs
            .delete_share_directory(&self.token)
            .await
    }
}

impl Drop for PendingUpload<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let blobs = self.service.blobs.clone();
        let token = self.token.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    debug!(token = %token, "Removing abandoned upload");
                    if let Err(e) = blobs.delete_share_directory(&token).await {
                        warn!(token = %token, error = %e, "Failed to remove abandoned upload");
                    }
                });
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(blobs.share_dir(&token));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use futures::stream;
    use tempfile::TempDir;

    type Chunks = stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>>;

    fn content(text: &str) -> Chunks {
        stream::iter(vec![Ok(Bytes::copy_from_slice(text.as_bytes()))])
    }

    fn name(s: &str) -> FileName {
        FileName::parse(s).unwrap()
    }

    async fn service() -> (TempDir, ShareService) {
        let temp_dir = TempDir::new().unwrap();
        let service = ShareService::open(temp_dir.path().join("shares"), "http://lan.test:8000/")
            .await
            .unwrap();
        (temp_dir, service)
    }

    async fn manual_share(service: &ShareService) -> ShareToken {
        service
            .create_share(vec![(name("a.txt"), content("hello"))], ShareDuration::Manual)
            .await
            .unwrap()
            .token
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(ShareDuration::parse("manual"), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse(" Manual "), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse("15"), ShareDuration::Minutes(15));
        assert_eq!(ShareDuration::parse("0"), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse("-5"), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse("ten"), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse(""), ShareDuration::Manual);
        assert_eq!(ShareDuration::parse("99999999999"), ShareDuration::Manual);
    }

    #[test]
    fn test_duration_expires_at() {
        let now = Utc::now();
        assert_eq!(ShareDuration::Manual.expires_at(now), None);
        assert_eq!(
            ShareDuration::Minutes(10).expires_at(now),
            Some(now + Duration::minutes(10))
        );
    }

    #[test]
    fn test_validity_revoked_wins_over_expired() {
        let now = Utc::now();
        let mut record = ShareRecord::new(now - Duration::hours(2), Some(now - Duration::hours(1)));
        assert_eq!(Validity::of_record(Some(&record), now), Validity::Expired);
        record.revoked = true;
        assert_eq!(Validity::of_record(Some(&record), now), Validity::Revoked);
        assert_eq!(Validity::of_record(None, now), Validity::Valid);
    }

    #[test]
    fn test_validity_expiry_is_strict() {
        let now = Utc::now();
        let record = ShareRecord::new(now - Duration::minutes(1), Some(now));
        assert_eq!(Validity::of_record(Some(&record), now), Validity::Valid);
    }

    #[tokio::test]
    async fn test_share_link_trims_trailing_slash() {
        let (_tmp, service) = service().await;
        let token = ShareToken::parse("abc").unwrap();
        assert_eq!(service.share_link(&token), "http://lan.test:8000/share/abc");
    }

    #[tokio::test]
    async fn test_create_share_returns_link_and_files() {
        let (_tmp, service) = service().await;
        let created = service
            .create_share(
                vec![(name("a.txt"), content("hello")), (name("b.txt"), content("world"))],
                ShareDuration::Minutes(30),
            )
            .await
            .unwrap();

        assert_eq!(created.file_names, vec!["a.txt", "b.txt"]);
        assert!(created.link.ends_with(&format!("/share/{}", created.token)));
        assert!(created.expires_at.is_some());
        assert_eq!(
            service.check_validity(&created.token).await.unwrap(),
            Validity::Valid
        );
    }

    #[tokio::test]
    async fn test_create_requires_directory() {
        let (_tmp, service) = service().await;
        let err = service
            .create(&ShareToken::generate(), ShareDuration::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let (_tmp, service) = service().await;
        let token = ShareToken::generate();
        assert_eq!(
            service.check_validity(&token).await.unwrap(),
            Validity::NotFound
        );
        assert!(matches!(
            service.list_files(&token).await,
            Err(ShareError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_timed_share_expires() {
        let (_tmp, service) = service().await;
        let token = manual_share(&service).await;
        let created = Utc::now();
        service
            .create_at(&token, ShareDuration::Minutes(5), created)
            .await
            .unwrap();

        let before = created + Duration::minutes(4);
        let after = created + Duration::minutes(6);
        assert_eq!(
            service.check_validity_at(&token, before).await.unwrap(),
            Validity::Valid
        );
        assert_eq!(
            service.check_validity_at(&token, after).await.unwrap(),
            Validity::Expired
        );
        assert!(!service.is_dead(&token, before).await);
        assert!(service.is_dead(&token, after).await);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (_tmp, service) = service().await;
        let token = manual_share(&service).await;

        assert!(service.revoke(&token).await.unwrap().revoked);
        assert!(service.revoke(&token).await.unwrap().revoked);
        assert_eq!(
            service.check_validity(&token).await.unwrap(),
            Validity::Revoked
        );
        assert!(service.is_dead(&token, Utc::now()).await);
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let (_tmp, service) = service().await;
        let err = service.revoke(&ShareToken::generate()).await.unwrap_err();
        assert!(matches!(err, ShareError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_revoked_share_rejects_reads() {
        let (_tmp, service) = service().await;
        let token = manual_share(&service).await;
        service.revoke(&token).await.unwrap();

        let err = service.open_file(&token, &name("a.txt")).await.err().unwrap();
        assert!(matches!(err, ShareError::Revoked { .. }));
        let err = service.bundle(&token).await.err().unwrap();
        assert!(matches!(err, ShareError::Revoked { .. }));
    }

    #[tokio::test]
    async fn test_share_without_record_is_valid_and_never_dead() {
        let (_tmp, service) = service().await;
        let token = ShareToken::parse("legacy-share").unwrap();
        service.blobs().create_share_directory(&token).await.unwrap();

        assert_eq!(
            service.check_validity(&token).await.unwrap(),
            Validity::Valid
        );
        assert!(!service.is_dead(&token, Utc::now() + Duration::days(365)).await);
    }

    #[tokio::test]
    async fn test_unreadable_record_does_not_break_reads() {
        let (_tmp, service) = service().await;
        let token = manual_share(&service).await;
        let record = service.blobs().share_dir(&token).join(".localshare.json");
        std::fs::remove_file(&record).unwrap();
        std::fs::create_dir(&record).unwrap();

        assert_eq!(
            service.check_validity(&token).await.unwrap(),
            Validity::Valid
        );
        assert_eq!(service.list_files(&token).await.unwrap().files.len(), 1);
        assert!(!service.is_dead(&token, Utc::now()).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finish_reports_record_failure_over_cleanup_failure() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, service) = service().await;
        let mut upload = service.start_upload().await.unwrap();
        upload.add_file(&name("a.txt"), content("hello")).await.unwrap();
        let dir = service.blobs().share_dir(upload.token());

        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        if std::fs::File::create(dir.join("write-check")).is_ok() {
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
            eprintln!("skipping: permissions are not enforced for this user");
            return;
        }

        let err = upload.finish(ShareDuration::Manual).await.unwrap_err();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(err.kind(), "io_failure");
        assert!(
            err.to_string().starts_with("failed to write metadata"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_purge_removes_share() {
        let (_tmp, service) = service().await;
        let token = manual_share(&service).await;

        service.purge(&token).await.unwrap();
        assert_eq!(
            service.check_validity(&token).await.unwrap(),
            Validity::NotFound
        );
        assert_eq!(service.metadata().tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_list_files_sorted_with_total() {
        let (_tmp, service) = service().await;
        let created = service
            .create_share(
                vec![(name("z.txt"), content("12")), (name("a.txt"), content("345"))],
                ShareDuration::Manual,
            )
            .await
            .unwrap();

        let listing = service.list_files(&created.token).await.unwrap();
        let names: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "z.txt"]);
        assert_eq!(listing.total_bytes, 5);
    }

    #[tokio::test]
    async fn test_abort_removes_directory() {
        let (_tmp, service) = service().await;
        let mut upload = service.start_upload().await.unwrap();
        upload.add_file(&name("a.txt"), content("hello")).await.unwrap();
        let token = upload.token().clone();

        upload.abort().await.unwrap();
        assert!(!service.blobs().share_exists(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_upload_is_cleaned_up() {
        let (_tmp, service) = service().await;
        let upload = service.start_upload().await.unwrap();
        let token = upload.token().clone();
        drop(upload);

        for _ in 0..50 {
            if !service.blobs().share_exists(&token).await.unwrap() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("abandoned upload directory was not removed");
    }

    #[tokio::test]
    async fn test_list_shares_reports_status() {
        let (_tmp, service) = service().await;
        let live = manual_share(&service).await;
        let revoked = manual_share(&service).await;
        service.revoke(&revoked).await.unwrap();

        let summaries = service.list_shares().await.unwrap();
        assert_eq!(summaries.len(), 2);
        let status = |t: &ShareToken| {
            summaries
                .iter()
                .find(|s| &s.token == t)
                .map(|s| s.validity)
                .unwrap()
        };
        assert_eq!(status(&live), Validity::Valid);
        assert_eq!(status(&revoked), Validity::Revoked);
        assert!(summaries.iter().all(|s| s.file_count == 1 && s.total_bytes == 5));
    }
}
