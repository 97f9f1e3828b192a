//! Validated share tokens and file names.
//!
//! Every identifier that arrives from a request passes through
//! [`ShareToken::parse`] or [`FileName::parse`] before it can become part of
//! a filesystem path. Neither constructor rewrites its input: a name is
//! either accepted as-is or rejected with [`ShareError::InvalidName`].

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::error::{ShareError, ShareResult};

/// Prefix reserved for files the store itself keeps inside a share
/// directory (the metadata record and in-progress temp files).
pub const RESERVED_PREFIX: &str = ".localshare";

const MAX_TOKEN_LEN: usize = 128;
const MAX_FILE_NAME_LEN: usize = 255;

/// Opaque identifier of a share, used both as link segment and storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Generate a new random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a token supplied by a caller.
    pub fn parse(value: &str) -> ShareResult<Self> {
        if value.is_empty() {
            return Err(ShareError::invalid_name(value, "token is empty"));
        }
        if value.len() > MAX_TOKEN_LEN {
            return Err(ShareError::invalid_name(value, "token is too long"));
        }
        if value.contains("..") {
            return Err(ShareError::invalid_name(value, "contains '..'"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ShareError::invalid_name(
                value,
                "token may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShareToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a file inside a share, guaranteed to stay within its directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    /// Validate a file name supplied by an uploader or downloader.
    pub fn parse(value: &str) -> ShareResult<Self> {
        if value.is_empty() {
            return Err(ShareError::invalid_name(value, "file name is empty"));
        }
        if value.len() > MAX_FILE_NAME_LEN {
            return Err(ShareError::invalid_name(value, "file name is too long"));
        }
        if value == "." || value.contains("..") {
            return Err(ShareError::invalid_name(value, "contains '..'"));
        }
        if value.contains(['/', '\\']) {
            return Err(ShareError::invalid_name(value, "contains a path separator"));
        }
        if value.chars().any(|c| c.is_ascii_control()) {
            return Err(ShareError::invalid_name(
                value,
                "contains a control character",
            ));
        }
        if value.starts_with(RESERVED_PREFIX) {
            return Err(ShareError::invalid_name(value, "uses a reserved name"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
