//! Configuration for the Sift CLI
//!
//! Locations of the manifest and the state file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Default manifest path, relative to the working directory
pub const DEFAULT_MANIFEST: &str = "sift.yml";

/// Default state file path, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = ".sift/state.json";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Manifest declaring sources and the artifact catalog
    pub manifest_path: PathBuf,

    /// JSON file holding observed state and conditions
    pub state_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST),
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl Config {
    /// Load config from environment variables (`SIFT_MANIFEST`, `SIFT_STATE_FILE`)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(manifest) = std::env::var("SIFT_MANIFEST") {
            config.manifest_path = PathBuf::from(manifest);
        }

        if let Ok(state) = std::env::var("SIFT_STATE_FILE") {
            config.state_path = PathBuf::from(state);
        }

        config
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, manifest: Option<PathBuf>, state: Option<PathBuf>) -> Self {
        if let Some(manifest) = manifest {
            self.manifest_path = manifest;
        }
        if let Some(state) = state {
            self.state_path = state;
        }
        self
    }
}
