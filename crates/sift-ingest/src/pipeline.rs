//! Pipeline orchestrator and change detector
//!
//! One run takes a [`SourceFilter`] through
//!
//! ```text
//! RESOLVING -> RESOLVED -> FETCHING -> FETCHED -> EXTRACTING -> EXTRACTED
//!           -> FILTERING -> HASHING -> HASHED -> UNCHANGED | UPDATED
//! ```
//!
//! with the failure exits `MISSING`, `RESOLVE_FAILED`, `FETCH_FAILED`,
//! `EXTRACT_FAILED` and `HASH_FAILED`. The run does not touch any stored
//! state: it returns a [`RunReport`] and leaves persistence to the caller.
//!
//! Downloads and extracted trees live in a per-run scratch directory that is
//! removed before [`Pipeline::run`] returns, whatever the outcome.

use crate::archive;
use crate::config::IngestConfig;
use crate::fetch::ArtifactFetcher;
use crate::files;
use crate::pattern::InclusionSpec;
use crate::resolver::SourceResolver;
use crate::status::StatusEvent;
use sift_common::fingerprint::{hash_files, open_relative};
use sift_common::{
    ArtifactDescriptor, Fingerprint, ObservedState, Reference, Result, SiftError, SourceFilter,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Every state a run passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Resolving,
    Missing,
    ResolveFailed,
    Resolved,
    Fetching,
    FetchFailed,
    Fetched,
    Extracting,
    ExtractFailed,
    Extracted,
    Filtering,
    Hashing,
    HashFailed,
    Hashed,
    Unchanged,
    Updated,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolving => "RESOLVING",
            Self::Missing => "MISSING",
            Self::ResolveFailed => "RESOLVE_FAILED",
            Self::Resolved => "RESOLVED",
            Self::Fetching => "FETCHING",
            Self::FetchFailed => "FETCH_FAILED",
            Self::Fetched => "FETCHED",
            Self::Extracting => "EXTRACTING",
            Self::ExtractFailed => "EXTRACT_FAILED",
            Self::Extracted => "EXTRACTED",
            Self::Filtering => "FILTERING",
            Self::Hashing => "HASHING",
            Self::HashFailed => "HASH_FAILED",
            Self::Hashed => "HASHED",
            Self::Unchanged => "UNCHANGED",
            Self::Updated => "UPDATED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self.is_failure() || matches!(self, Self::Unchanged | Self::Updated)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Missing
                | Self::ResolveFailed
                | Self::FetchFailed
                | Self::ExtractFailed
                | Self::HashFailed
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Fetch,
    Extract,
    /// Enumeration, filtering and fingerprinting
    Hash,
}

impl Stage {
    pub fn failure_state(self) -> PipelineState {
        match self {
            Self::Resolve => PipelineState::ResolveFailed,
            Self::Fetch => PipelineState::FetchFailed,
            Self::Extract => PipelineState::ExtractFailed,
            Self::Hash => PipelineState::HashFailed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Hash => "fingerprint",
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    /// The referenced source does not exist
    Missing,
    Failed { stage: Stage, error: SiftError },
    /// Fingerprint equals the previously observed one
    Unchanged { fingerprint: Fingerprint },
    /// New observed state that replaces the stored one
    Updated { state: Box<ObservedState> },
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct RunReport {
    pub reference: Reference,
    /// Set once resolution succeeded
    pub artifact: Option<ArtifactDescriptor>,
    pub outcome: Outcome,
}

impl RunReport {
    pub fn terminal_state(&self) -> PipelineState {
        match &self.outcome {
            Outcome::Missing => PipelineState::Missing,
            Outcome::Failed { stage, .. } => stage.failure_state(),
            Outcome::Unchanged { .. } => PipelineState::Unchanged,
            Outcome::Updated { .. } => PipelineState::Updated,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.terminal_state().is_failure()
    }

    /// Fingerprint of the filtered content, if the run got that far
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match &self.outcome {
            Outcome::Unchanged { fingerprint } => Some(fingerprint),
            Outcome::Updated { state } => Some(&state.fingerprint),
            _ => None,
        }
    }

    /// Failure message, embedding the reference and the underlying error
    pub fn failure_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failed { stage, error } => Some(format!(
                "{} failed for {}: {}",
                stage.verb(),
                self.reference,
                error
            )),
            _ => None,
        }
    }

    /// Status events in the order they should be reported
    pub fn events(&self) -> Vec<StatusEvent> {
        let mut events = Vec::with_capacity(2);

        if let Outcome::Missing = self.outcome {
            events.push(StatusEvent::missing(&self.reference));
            return events;
        }

        if let Some(artifact) = &self.artifact {
            events.push(StatusEvent::ArtifactResolved {
                url: artifact.url.clone(),
            });
        }

        if let Some(message) = self.failure_message() {
            events.push(StatusEvent::Failed { message });
        } else if let Some(fingerprint) = self.fingerprint() {
            events.push(StatusEvent::Ready {
                fingerprint: fingerprint.clone(),
            });
        }

        events
    }

    /// The state to persist, only present for [`Outcome::Updated`]
    pub fn into_observed(self) -> Option<ObservedState> {
        match self.outcome {
            Outcome::Updated { state } => Some(*state),
            _ => None,
        }
    }
}

struct StageError {
    stage: Stage,
    error: SiftError,
}

impl StageError {
    fn at(stage: Stage) -> impl FnOnce(SiftError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Runs the download, extract, filter, fingerprint, compare sequence
pub struct Pipeline {
    resolver: Arc<dyn SourceResolver>,
    fetcher: ArtifactFetcher,
    scratch_dir: PathBuf,
}

impl Pipeline {
    pub fn new(resolver: Arc<dyn SourceResolver>, config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            resolver,
            fetcher: ArtifactFetcher::new(&config.fetch)?,
            scratch_dir: config.scratch_dir.clone(),
        })
    }

    /// Run the pipeline once for `filter`.
    ///
    /// `previous` is the stored observed state, compared against the new
    /// fingerprint. Never fails: every error ends up in the report.
    pub async fn run(
        &self,
        filter: &SourceFilter,
        previous: Option<&ObservedState>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let span = info_span!("pipeline", reference = %filter.source_ref);
        let report = self.run_inner(filter, previous, cancel).instrument(span).await;

        match &report.outcome {
            Outcome::Missing => warn!(reference = %report.reference, "source missing"),
            Outcome::Failed { error: e, .. } if e.is_security_violation() => error!(
                reference = %report.reference,
                state = %report.terminal_state(),
                error = %e,
                "archive rejected"
            ),
            Outcome::Failed { error: e, .. } => warn!(
                reference = %report.reference,
                state = %report.terminal_state(),
                error = %e,
                "run failed"
            ),
            Outcome::Unchanged { fingerprint } => info!(
                reference = %report.reference,
                fingerprint = %fingerprint,
                "source unchanged"
            ),
            Outcome::Updated { state } => info!(
                reference = %report.reference,
                fingerprint = %state.fingerprint,
                files = state.observed_file_list.len(),
                "source updated"
            ),
        }

        report
    }

    async fn run_inner(
        &self,
        filter: &SourceFilter,
        previous: Option<&ObservedState>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let reference = filter.source_ref.clone();

        debug!(state = %PipelineState::Resolving);
        let artifact = match cancellable(cancel, "resolving", self.resolver.resolve(&reference)).await
        {
            Ok(artifact) => artifact,
            Err(SiftError::SourceNotFound(_)) => {
                debug!(state = %PipelineState::Missing);
                return RunReport {
                    reference,
                    artifact: None,
                    outcome: Outcome::Missing,
                };
            },
            Err(error) => {
                return RunReport {
                    reference,
                    artifact: None,
                    outcome: Outcome::Failed {
                        stage: Stage::Resolve,
                        error,
                    },
                };
            },
        };
        debug!(state = %PipelineState::Resolved, url = %artifact.url);

        let outcome = match self.scratch_area() {
            Ok(scratch) => {
                let result = self.process(filter, &artifact, previous, scratch.path(), cancel).await;
                let location = scratch.path().display().to_string();
                if let Err(e) = scratch.close() {
                    warn!(path = %location, error = %e, "failed to remove scratch area");
                }
                result
            },
            Err(error) => Err(StageError {
                stage: Stage::Fetch,
                error,
            }),
        };

        RunReport {
            reference,
            artifact: Some(artifact),
            outcome: outcome.unwrap_or_else(|e| Outcome::Failed {
                stage: e.stage,
                error: e.error,
            }),
        }
    }

    fn scratch_area(&self) -> Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("sift-run-")
            .tempdir_in(&self.scratch_dir)?)
    }

    async fn process(
        &self,
        filter: &SourceFilter,
        artifact: &ArtifactDescriptor,
        previous: Option<&ObservedState>,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<Outcome, StageError> {
        let archive_path = scratch.join("artifact.tar.gz");
        let extract_dir = scratch.join("extracted");

        debug!(state = %PipelineState::Fetching);
        let bytes = cancellable(
            cancel,
            "fetching",
            self.fetcher.fetch_to_file(&artifact.url, &archive_path),
        )
        .await
        .map_err(StageError::at(Stage::Fetch))?;
        debug!(state = %PipelineState::Fetched, bytes);

        debug!(state = %PipelineState::Extracting);
        let summary = {
            let archive_path = archive_path.clone();
            let extract_dir = extract_dir.clone();
            let cancel = cancel.clone();
            blocking(move || archive::extract_tar_gz_file(&archive_path, &extract_dir, &cancel))
                .await
                .map_err(StageError::at(Stage::Extract))?
        };
        debug!(state = %PipelineState::Extracted, files = summary.files, bytes = summary.bytes);

        let include = filter.include.clone();
        let cancel = cancel.clone();
        let (included, fingerprint) = blocking(move || {
            debug!(state = %PipelineState::Filtering);
            let all = files::list_files(&extract_dir)?;
            debug!(files = ?all, "enumerated files");

            let mut included = InclusionSpec::parse(&include).filter(&all);
            included.sort_unstable();
            debug!(files = ?included, "filtered files");

            debug!(state = %PipelineState::Hashing);
            let fingerprint = hash_files(&included, |path| {
                if cancel.is_cancelled() {
                    return Err(SiftError::Cancelled("fingerprinting".to_string()));
                }
                open_relative(&extract_dir, path)
            })?;

            Ok((included, fingerprint))
        })
        .await
        .map_err(StageError::at(Stage::Hash))?;
        debug!(state = %PipelineState::Hashed, fingerprint = %fingerprint);

        if previous.is_some_and(|p| p.fingerprint == fingerprint) {
            return Ok(Outcome::Unchanged { fingerprint });
        }

        Ok(Outcome::Updated {
            state: Box::new(ObservedState {
                fingerprint,
                artifact: artifact.clone(),
                observed_include: filter.include.clone(),
                observed_file_list: included,
                url: artifact.url.clone(),
            }),
        })
    }
}

/// Race a future against cancellation
async fn cancellable<T, F>(cancel: &CancellationToken, doing: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SiftError::Cancelled(doing.to_string())),
        result = fut => result,
    }
}

/// Run filesystem-heavy work off the async executor, span included
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| SiftError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn reference() -> Reference {
        Reference::new("GitRepository", "v1", "app", "default")
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::ResolveFailed.to_string(), "RESOLVE_FAILED");
        assert_eq!(PipelineState::Unchanged.to_string(), "UNCHANGED");
        assert!(PipelineState::Missing.is_failure());
        assert!(PipelineState::Updated.is_terminal());
        assert!(!PipelineState::Hashing.is_terminal());
    }

    #[test]
    fn test_missing_report_has_single_event() {
        let report = RunReport {
            reference: reference(),
            artifact: None,
            outcome: Outcome::Missing,
        };
        assert_eq!(report.terminal_state(), PipelineState::Missing);
        assert_eq!(report.events(), vec![StatusEvent::missing(&reference())]);
        assert!(report.into_observed().is_none());
    }

    #[test]
    fn test_failure_message_embeds_reference() {
        let report = RunReport {
            reference: reference(),
            artifact: Some(ArtifactDescriptor::from_url("http://x/a.tar.gz")),
            outcome: Outcome::Failed {
                stage: Stage::Fetch,
                error: SiftError::fetch("http://x/a.tar.gz", "404 Not Found"),
            },
        };

        assert_eq!(report.terminal_state(), PipelineState::FetchFailed);
        let message = report.failure_message().unwrap();
        assert!(message.contains("GitRepository default/app"), "{message}");
        assert!(message.contains("http://x/a.tar.gz"), "{message}");

        let events = report.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StatusEvent::ArtifactResolved { .. }));
        assert!(matches!(events[1], StatusEvent::Failed { .. }));
    }

    #[test]
    fn test_unchanged_still_reports_ready() {
        let fingerprint: Fingerprint = "h1:abc=".parse().unwrap();
        let report = RunReport {
            reference: reference(),
            artifact: Some(ArtifactDescriptor::from_url("http://x/a.tar.gz")),
            outcome: Outcome::Unchanged {
                fingerprint: fingerprint.clone(),
            },
        };
        assert_eq!(
            report.events().last(),
            Some(&StatusEvent::Ready { fingerprint })
        );
        assert!(report.into_observed().is_none());
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> =
            cancellable(&cancel, "waiting", std::future::pending::<Result<()>>()).await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
