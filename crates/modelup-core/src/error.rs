//! Error taxonomy for update operations.

use std::fmt;
use std::path::{Path, PathBuf};

use modelup_schema::ManifestError;
use thiserror::Error;

/// Result alias used throughout the core crate.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Everything that can go wrong while checking for or installing updates.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Connection, DNS, TLS, timeout, or body read failure.
    #[error("Network error fetching {url}: {source}")]
    Network {
        /// URL being fetched when the failure happened.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx terminal status.
    #[error("HTTP {status} from {url}")]
    Transport {
        /// Response status code.
        status: u16,
        /// URL that produced the status.
        url: String,
    },

    /// A redirect chain exceeded the configured depth.
    #[error("Too many redirects (limit {limit}) starting at {url}")]
    TooManyRedirects {
        /// URL the chain started from.
        url: String,
        /// The configured limit.
        limit: usize,
    },

    /// Downloaded bytes do not hash to the expected digest.
    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Model name.
        name: String,
        /// Digest from the manifest.
        expected: String,
        /// Digest of the downloaded file.
        actual: String,
    },

    /// Preflight found less free space than the download needs.
    #[error("Insufficient disk space: {required} bytes required, {available} available")]
    InsufficientDiskSpace {
        /// Bytes the download declares.
        required: u64,
        /// Bytes available on the target filesystem.
        available: u64,
    },

    /// A pending update has no download locator.
    #[error("No download URL for model {name}")]
    MissingSourceUrl {
        /// Model name.
        name: String,
    },

    /// The local manifest exists but cannot be used.
    #[error("Manifest {} is unusable: {reason}", path.display())]
    ManifestCorrupt {
        /// Manifest location.
        path: PathBuf,
        /// Parse or validation failure.
        reason: String,
    },

    /// Local filesystem failure.
    #[error("{context} {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        context: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Stable, display-friendly classification of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`UpdateError::Network`].
    Network,
    /// See [`UpdateError::Transport`] and [`UpdateError::TooManyRedirects`].
    Transport,
    /// See [`UpdateError::ChecksumMismatch`].
    ChecksumMismatch,
    /// See [`UpdateError::InsufficientDiskSpace`].
    InsufficientDiskSpace,
    /// See [`UpdateError::MissingSourceUrl`].
    MissingSourceUrl,
    /// See [`UpdateError::ManifestCorrupt`].
    ManifestCorrupt,
    /// See [`UpdateError::Io`].
    Io,
    /// See [`UpdateError::Cancelled`].
    Cancelled,
}

impl ErrorKind {
    /// Short label suitable for "failed: <kind>" style messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Transport => "transport",
            Self::ChecksumMismatch => "checksum-mismatch",
            Self::InsufficientDiskSpace => "insufficient-disk-space",
            Self::MissingSourceUrl => "missing-source-url",
            Self::ManifestCorrupt => "manifest-corrupt",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UpdateError {
    /// Create an I/O error with context for better debugging.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Transport { .. } | Self::TooManyRedirects { .. } => ErrorKind::Transport,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::InsufficientDiskSpace { .. } => ErrorKind::InsufficientDiskSpace,
            Self::MissingSourceUrl { .. } => ErrorKind::MissingSourceUrl,
            Self::ManifestCorrupt { .. } => ErrorKind::ManifestCorrupt,
            Self::Io { .. } => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a fresh attempt of the whole download could succeed.
    ///
    /// Status codes are not special-cased: a 404 is retried like a 503.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Transport { .. }
                | Self::TooManyRedirects { .. }
                | Self::ChecksumMismatch { .. }
                | Self::Io { .. }
        )
    }
}

impl UpdateError {
    /// Map a manifest failure at `path` into the update taxonomy.
    ///
    /// Unreadable files stay I/O errors; anything that was read but could not
    /// be understood is `ManifestCorrupt`.
    pub fn manifest(path: &Path, err: ManifestError) -> Self {
        match err {
            ManifestError::Io { path, source } => Self::Io {
                context: "Failed to access manifest",
                path,
                source,
            },
            ManifestError::Parse { path, source } => Self::ManifestCorrupt {
                path,
                reason: source.to_string(),
            },
            ManifestError::InvalidEntry { name, reason } => Self::ManifestCorrupt {
                path: path.to_path_buf(),
                reason: format!("entry '{name}': {reason}"),
            },
        }
    }
}
