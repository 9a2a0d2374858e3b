//! Sift Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, fingerprinting, and error handling for the Sift workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the run failure taxonomy ([`SiftError`]) and result alias
//! - **Fingerprints**: deterministic `h1:` content hashes over a file set
//! - **Types**: references, artifact descriptors, and observed state
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use sift_common::fingerprint::hash_dir_files;
//! use sift_common::Result;
//!
//! fn fingerprint(root: &str) -> Result<()> {
//!     let files = vec!["go.mod".to_string(), "main.go".to_string()];
//!     let fingerprint = hash_dir_files(root, &files)?;
//!     println!("{}", fingerprint);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SiftError};
pub use types::{ArtifactDescriptor, Fingerprint, ObservedState, Reference, SourceFilter};
