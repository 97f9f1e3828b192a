//! On-disk storage of uploaded file blobs, one directory per share.
//!
//! The blob store knows nothing about expiry or revocation. It only maps a
//! validated [`ShareToken`] to `<root>/<token>/` and a validated
//! [`FileName`] to a regular file inside it.

use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::{ShareError, ShareResult};
use super::names::{FileName, ShareToken, RESERVED_PREFIX};

/// Buffer size for streamed reads, writes and archive copies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A file stored in a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size_bytes: u64,
}

/// Chunked byte stream over a file on disk.
pub type ByteStream = ReaderStream<fs::File>;

/// An opened file ready to be streamed to a downloader.
pub struct FileDownload {
    pub name: FileName,
    pub size_bytes: u64,
    pub stream: ByteStream,
}

/// A finished ZIP archive of a share, backed by an anonymous temp file.
pub struct ArchiveDownload {
    pub size_bytes: u64,
    pub stream: ByteStream,
}

/// Temp file that is removed unless it was renamed onto its final name.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

enum Listing {
    Start(PathBuf),
    Reading(fs::ReadDir),
}

/// Filesystem-backed blob store rooted at a storage directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a blob store without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a blob store, making sure the storage root exists.
    pub async fn open(root: impl Into<PathBuf>) -> ShareResult<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await.map_err(|e| {
            ShareError::io(
                format!("failed to create storage root {}", store.root.display()),
                e,
            )
        })?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a share's files and metadata record.
    pub fn share_dir(&self, token: &ShareToken) -> PathBuf {
        self.root.join(token.as_str())
    }

    fn file_path(&self, token: &ShareToken, name: &FileName) -> PathBuf {
        self.share_dir(token).join(name.as_str())
    }

    /// A unique scratch path inside the share directory.
    ///
    /// Scratch names carry the reserved prefix, so they never show up in
    /// listings or archives and can never be requested by name.
    pub(crate) fn temp_path(&self, token: &ShareToken, purpose: &str) -> PathBuf {
        self.share_dir(token).join(format!(
            "{}-{}-{}.part",
            RESERVED_PREFIX,
            purpose,
            Uuid::new_v4().simple()
        ))
    }

    /// Whether a directory exists for `token`.
    pub async fn share_exists(&self, token: &ShareToken) -> ShareResult<bool> {
        match fs::metadata(self.share_dir(token)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShareError::io(format!("failed to stat share {token}"), e)),
        }
    }

    /// Create the empty directory for a new share.
    pub async fn create_share_directory(&self, token: &ShareToken) -> ShareResult<PathBuf> {
        let dir = self.share_dir(token);
        match fs::create_dir(&dir).await {
            Ok(()) => {
                debug!(token = %token, "Created share directory");
                Ok(dir)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(ShareError::AlreadyExists {
                token: token.to_string(),
            }),
            Err(e) => Err(ShareError::io(
                format!("failed to create share directory {}", dir.display()),
                e,
            )),
        }
    }

    /// Stream `content` into `name` inside the share.
    ///
    /// Chunks land in a scratch file first; the final name only appears once
    /// the whole stream has been written. Returns the number of bytes written.
    pub async fn write_file<S, E>(
        &self,
        token: &ShareToken,
        name: &FileName,
        content: S,
    ) -> ShareResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let final_path = self.file_path(token, name);
        let mut partial = PartialFile::new(self.temp_path(token, "upload"));

        let mut file = fs::File::create(&partial.path)
            .await
            .map_err(|e| ShareError::io_for(token.as_str(), format!("failed to create {name}"), e))?;

        let mut content = std::pin::pin!(content);
        let mut written = 0u64;
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|e| {
                ShareError::io(format!("upload of {name} interrupted"), io::Error::other(e))
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ShareError::io(format!("failed to write {name}"), e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| ShareError::io(format!("failed to flush {name}"), e))?;
        drop(file);

        fs::rename(&partial.path, &final_path)
            .await
            .map_err(|e| ShareError::io_for(token.as_str(), format!("failed to store {name}"), e))?;
        partial.commit();

        debug!(token = %token, file = %name, bytes = written, "Stored file");
        Ok(written)
    }

    /// Lazily list the regular files of a share.
    ///
    /// The metadata record, scratch files, directories and symlinks are
    /// skipped. A missing share directory yields a single `NotFound` error.
    pub fn list_files(
        &self,
        token: &ShareToken,
    ) -> impl Stream<Item = ShareResult<FileEntry>> + Send + 'static {
        let dir = self.share_dir(token);
        let token = token.clone();

        stream::try_unfold(Listing::Start(dir), move |state| {
            next_listed_file(state, token.clone())
        })
    }

    /// Open a file of the share for streaming.
    pub async fn read_file(&self, token: &ShareToken, name: &FileName) -> ShareResult<FileDownload> {
        let path = self.file_path(token, name);
        let not_found = || ShareError::file_not_found(token.as_str(), name.as_str());

        let meta = match fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ShareError::io(format!("failed to stat {name}"), e)),
        };
        if !meta.is_file() {
            return Err(not_found());
        }

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ShareError::io(format!("failed to open {name}"), e)),
        };

        Ok(FileDownload {
            name: name.clone(),
            size_bytes: meta.len(),
            stream: ReaderStream::with_capacity(file, CHUNK_SIZE),
        })
    }

    /// Build a deflate ZIP of every file in the share.
    ///
    /// The archive is assembled on a blocking worker into an anonymous temp
    /// file under the storage root, copying one file at a time through a
    /// fixed buffer.
    pub async fn bundle_as_archive(&self, token: &ShareToken) -> ShareResult<ArchiveDownload> {
        let mut entries: Vec<FileEntry> = self.list_files(token).try_collect().await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let spool_dir = self.root.clone();
        let dir = self.share_dir(token);
        let owner = token.clone();
        let file_count = entries.len();
        let archive =
            tokio::task::spawn_blocking(move || write_archive(&spool_dir, &dir, &owner, &entries))
                .await
                .map_err(|e| ShareError::io("archive task failed", io::Error::other(e)))??;

        let size_bytes = archive
            .metadata()
            .map_err(|e| ShareError::io("failed to stat archive", e))?
            .len();
        debug!(token = %token, files = file_count, bytes = size_bytes, "Built share archive");

        Ok(ArchiveDownload {
            size_bytes,
            stream: ReaderStream::with_capacity(fs::File::from_std(archive), CHUNK_SIZE),
        })
    }

    /// Remove a share directory and everything in it. Missing is fine.
    pub async fn delete_share_directory(&self, token: &ShareToken) -> ShareResult<()> {
        match fs::remove_dir_all(self.share_dir(token)).await {
            Ok(()) => {
                debug!(token = %token, "Deleted share directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShareError::io(format!("failed to delete share {token}"), e)),
        }
    }

    /// Every share directory under the storage root.
    ///
    /// Entries whose names are not valid tokens are ignored.
    pub async fn list_tokens(&self) -> ShareResult<Vec<ShareToken>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ShareError::io("failed to list storage root", e)),
        };

        let mut tokens = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShareError::io("failed to list storage root", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(token) = entry
                .file_name()
                .to_str()
                .and_then(|name| ShareToken::parse(name).ok())
            {
                tokens.push(token);
            }
        }
        tokens.sort();
        Ok(tokens)
    }
}

async fn next_listed_file(
    state: Listing,
    token: ShareToken,
) -> ShareResult<Option<(FileEntry, Listing)>> {
    let list_error =
        |e: io::Error| ShareError::io_for(token.as_str(), format!("failed to list share {token}"), e);

    let mut entries = match state {
        Listing::Start(dir) => fs::read_dir(&dir).await.map_err(list_error)?,
        Listing::Reading(entries) => entries,
    };

    while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
        if let Some(file) = regular_file_entry(&entry).await? {
            return Ok(Some((file, Listing::Reading(entries))));
        }
    }
    Ok(None)
}

async fn regular_file_entry(entry: &fs::DirEntry) -> ShareResult<Option<FileEntry>> {
    let Ok(name) = entry.file_name().into_string() else {
        return Ok(None);
    };
    if FileName::parse(&name).is_err() {
        return Ok(None);
    }

    // file_type() does not follow symlinks
    match entry.file_type().await {
        Ok(t) if t.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ShareError::io(format!("failed to stat {name}"), e)),
    }

    match entry.metadata().await {
        Ok(meta) => Ok(Some(FileEntry {
            name,
            size_bytes: meta.len(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ShareError::io(format!("failed to stat {name}"), e)),
    }
}

/// Write the archive into an anonymous file under `spool_dir`.
///
/// Only a source file vanishing mid-build means the share is gone; every
/// other failure is reported as IO.
fn write_archive(
    spool_dir: &Path,
    dir: &Path,
    token: &ShareToken,
    entries: &[FileEntry],
) -> ShareResult<std::fs::File> {
    let archive_error = |e: io::Error| ShareError::io(format!("failed to build archive for {token}"), e);

    let spool = tempfile::tempfile_in(spool_dir)
        .map_err(|e| ShareError::io("failed to create archive spool file", e))?;
    let mut zip = ZipWriter::new(spool);

    for entry in entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(entry.size_bytes >= u64::from(u32::MAX));
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| archive_error(io::Error::other(e)))?;

        let source = std::fs::File::open(dir.join(&entry.name)).map_err(|e| {
            ShareError::io_for(token.as_str(), format!("failed to open {}", entry.name), e)
        })?;
        let mut source = BufReader::with_capacity(CHUNK_SIZE, source);
        io::copy(&mut source, &mut zip).map_err(archive_error)?;
    }

    let mut file = zip
        .finish()
        .map_err(|e| archive_error(io::Error::other(e)))?;
    file.seek(SeekFrom::Start(0)).map_err(archive_error)?;
    Ok(file)
}
