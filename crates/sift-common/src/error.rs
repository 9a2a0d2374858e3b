//! Error types for Sift
//!
//! Every variant that can end a pipeline run carries enough context (the
//! reference, the URL, or the offending archive entry) for the failure
//! message to stand on its own in a status condition.

use thiserror::Error;

/// Result type alias for Sift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Main error type for Sift
#[derive(Error, Debug)]
pub enum SiftError {
    /// The referenced upstream source does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// The resolver failed for a reason other than absence
    #[error("Failed to resolve {reference}: {reason}")]
    Resolve { reference: String, reason: String },

    /// Transport failure or non-success status while downloading
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Gzip or tar structure could not be decoded
    #[error("Corrupt archive: {0}")]
    ArchiveCorrupt(String),

    /// Archive contains an entry that is neither a directory nor a regular file
    #[error("Unsupported archive entry '{entry}' of type {kind}")]
    UnsupportedEntry { entry: String, kind: String },

    /// Archive entry would be written outside the extraction root
    #[error("Archive entry '{entry}' escapes extraction root '{root}'")]
    PathEscape { entry: String, root: String },

    /// A listed file could not be read while fingerprinting
    #[error("Failed to read '{path}' for fingerprint: {source}")]
    FingerprintIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A file name that cannot appear in a fingerprint summary line
    #[error("Invalid file name for fingerprint: {0:?}")]
    InvalidFileName(String),

    /// The run was cancelled (deadline or shutdown)
    #[error("Cancelled while {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SiftError {
    /// Create a fetch error for a URL
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a resolve error for a reference
    pub fn resolve(reference: impl ToString, reason: impl ToString) -> Self {
        Self::Resolve {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an archive corruption error
    pub fn archive_corrupt(msg: impl Into<String>) -> Self {
        Self::ArchiveCorrupt(msg.into())
    }

    /// Whether this error is a security violation that must never be skipped
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathEscape { .. })
    }

    /// Whether this error came from cancellation rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
