//! Share storage and lifecycle.
//!
//! Leaves first: [`names`] validates identifiers, [`blob_store`] keeps the
//! file bytes, [`metadata`] keeps the per-share record, [`lifecycle`] decides
//! liveness, and [`reaper`] reclaims dead shares in the background.

pub mod blob_store;
pub mod error;
pub mod lifecycle;
pub mod metadata;
pub mod names;
pub mod reaper;

pub use blob_store::{ArchiveDownload, BlobStore, FileDownload, FileEntry};
pub use error::{ShareError, ShareResult};
pub use lifecycle::{
    CreatedShare, PendingUpload, ShareDuration, ShareListing, ShareService, ShareSummary,
    Validity,
};
pub use metadata::{MetadataStore, ShareLock, ShareRecord};
pub use names::{FileName, ShareToken};
pub use reaper::{ReapReport, Reaper, DEFAULT_REAP_INTERVAL};
