//! Sift Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The change-detection pipeline: fetch an upstream artifact, unpack it,
//! keep the files an inclusion spec selects, fingerprint them, and compare
//! against the last observed fingerprint.
//!
//! # Modules
//!
//! - [`archive`]: path sanitizer and streaming `.tar.gz` extraction
//! - [`pattern`]: gitignore-style inclusion patterns and file filtering
//! - [`files`]: regular-file enumeration
//! - [`fetch`]: streaming HTTP download
//! - [`resolver`]: reference to artifact resolution
//! - [`status`]: status events, conditions and sinks
//! - [`pipeline`]: the per-run state machine
//! - [`reconciler`]: locking, deadlines and parallel runs over many sources
//! - [`config`]: environment-driven settings
//!
//! # Example
//!
//! ```no_run
//! use sift_common::{ArtifactDescriptor, Reference, SourceFilter};
//! use sift_ingest::{CatalogResolver, IngestConfig, MemoryStatusSink, Pipeline, Reconciler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let reference = Reference::new("GitRepository", "v1", "app", "default");
//! let resolver: CatalogResolver<ArtifactDescriptor> = [(
//!     reference.clone(),
//!     ArtifactDescriptor::from_url("http://artifacts.local/app.tar.gz"),
//! )]
//! .into_iter()
//! .collect();
//!
//! let config = IngestConfig::from_env()?;
//! let pipeline = Pipeline::new(Arc::new(resolver), &config)?;
//! let reconciler = Reconciler::new(pipeline, Arc::new(MemoryStatusSink::new()), &config);
//!
//! let filter = SourceFilter::new(reference, "go.*\ninternal/**/*.go\n");
//! let report = reconciler.reconcile(&filter, &CancellationToken::new()).await?;
//! println!("{}", report.terminal_state());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod fetch;
pub mod files;
pub mod pattern;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;
pub mod status;

pub use config::{FetchConfig, IngestConfig};
pub use fetch::ArtifactFetcher;
pub use pattern::{filter_file_list, InclusionSpec};
pub use pipeline::{Outcome, Pipeline, PipelineState, RunReport, Stage};
pub use reconciler::{Reconciler, ReferenceLocks};
pub use resolver::{CatalogResolver, HasArtifact, SourceResolver};
pub use status::{Condition, MemoryStatusSink, StatusEvent, StatusSink};
