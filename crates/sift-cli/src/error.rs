//! Error types for the Sift CLI
//!
//! User-facing errors with messages that say what to check next.

use sift_common::SiftError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Required file is missing
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// Manifest file (sift.yml) has invalid format or content
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// State file has invalid format or content
    #[error("Invalid state file: {0}. Delete it and run 'sift check' to rebuild it.")]
    InvalidState(String),

    /// Named source is not declared in the manifest
    #[error("Source '{0}' is not defined in the manifest.")]
    SourceNotFound(String),

    /// At least one pipeline run ended in a failure state
    #[error("{failed} of {total} source(s) failed")]
    RunsFailed { failed: usize, total: usize },

    /// Error from the pipeline library
    #[error(transparent)]
    Sift(#[from] SiftError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables.")]
    Config(String),

    /// YAML parsing failed
    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
