//! Error types for share storage and lifecycle operations.

use thiserror::Error;

/// Errors that can occur while creating, reading or reclaiming a share.
#[derive(Debug, Error)]
pub enum ShareError {
    /// The share token does not exist.
    #[error("share not found: {token}")]
    NotFound { token: String },

    /// The share exists but the requested file does not.
    #[error("file not found: {name} in share {token}")]
    FileNotFound { token: String, name: String },

    /// The share was explicitly withdrawn.
    #[error("share has been revoked: {token}")]
    Revoked { token: String },

    /// The share outlived its expiry time.
    #[error("share has expired: {token}")]
    Expired { token: String },

    /// A token or file name failed validation.
    #[error("invalid name {value:?}: {reason}")]
    InvalidName { value: String, reason: &'static str },

    /// A freshly generated token collided with an existing share.
    #[error("share already exists: {token}")]
    AlreadyExists { token: String },

    /// The filesystem failed underneath us.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for share operations.
pub type ShareResult<T> = Result<T, ShareError>;

impl ShareError {
    /// Create a share-not-found error.
    pub fn not_found(token: impl Into<String>) -> Self {
        Self::NotFound {
            token: token.into(),
        }
    }

    /// Create a file-not-found error.
    pub fn file_not_found(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self::FileNotFound {
            token: token.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-name error.
    pub fn invalid_name(value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            value: value.into(),
            reason,
        }
    }

    /// Wrap an IO error with context.
    ///
    /// `NotFound` is kept as a plain IO error here; callers that know which
    /// share or file vanished use [`ShareError::io_for`] instead.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap an IO error raised while touching `token`, mapping a vanished
    /// path onto [`ShareError::NotFound`].
    ///
    /// The reaper may delete a share while a reader is mid-stream; the
    /// reader then sees a clean "not found" rather than an IO failure.
    pub fn io_for(token: &str, context: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(token)
        } else {
            Self::io(context, source)
        }
    }

    /// Stable snake_case label for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::FileNotFound { .. } => "not_found",
            Self::Revoked { .. } => "revoked",
            Self::Expired { .. } => "expired",
            Self::InvalidName { .. } => "invalid_name",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Io { .. } => "io_failure",
        }
    }

    /// Whether this error means the share is gone (revoked or expired)
    /// rather than never having existed.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Revoked { .. } | Self::Expired { .. })
    }
}
