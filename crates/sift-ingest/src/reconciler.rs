//! Reconciliation across many sources
//!
//! The reconciler wraps [`Pipeline::run`] with everything a run needs from
//! its surroundings: the stored observed state (read once), a deadline,
//! reporting of the resulting events, and the single write of the new
//! observed state. Runs for distinct references proceed in parallel; runs
//! for the same reference are serialized by [`ReferenceLocks`].

use crate::config::IngestConfig;
use crate::pipeline::{Outcome, Pipeline, RunReport};
use crate::status::StatusSink;
use sift_common::{Reference, Result, SiftError, SourceFilter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-reference mutual exclusion
#[derive(Debug, Default)]
pub struct ReferenceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReferenceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `reference`.
    ///
    /// Entries nobody holds or waits on are dropped on the way, so the map
    /// only tracks references with a run in flight.
    pub async fn acquire(&self, reference: &Reference) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(reference.key()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of references currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

/// Drives pipeline runs and feeds their results into a status sink
pub struct Reconciler<S> {
    pipeline: Arc<Pipeline>,
    sink: Arc<S>,
    locks: Arc<ReferenceLocks>,
    max_concurrent_runs: usize,
    run_timeout: Duration,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            sink: self.sink.clone(),
            locks: self.locks.clone(),
            max_concurrent_runs: self.max_concurrent_runs,
            run_timeout: self.run_timeout,
        }
    }
}

impl<S: StatusSink + 'static> Reconciler<S> {
    pub fn new(pipeline: Pipeline, sink: Arc<S>, config: &IngestConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sink,
            locks: Arc::new(ReferenceLocks::new()),
            max_concurrent_runs: config.max_concurrent_runs.max(1),
            run_timeout: config.run_timeout(),
        }
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Run one source to completion and persist the outcome.
    ///
    /// Errors are only returned when the sink itself fails; pipeline
    /// failures are part of the report.
    pub async fn reconcile(
        &self,
        filter: &SourceFilter,
        shutdown: &CancellationToken,
    ) -> Result<RunReport> {
        let reference = &filter.source_ref;
        let _guard = self.locks.acquire(reference).await;

        let previous = self.sink.observed(reference).await?;
        debug!(
            reference = %reference,
            previous = previous.as_ref().map(|p| p.fingerprint.as_str()),
            "starting run"
        );

        let cancel = shutdown.child_token();
        let deadline = {
            let cancel = cancel.clone();
            let timeout = self.run_timeout;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => cancel.cancel(),
                    _ = cancel.cancelled() => {},
                }
            })
        };

        let report = self.pipeline.run(filter, previous.as_ref(), &cancel).await;
        deadline.abort();

        if let Outcome::Updated { state } = &report.outcome {
            self.sink
                .replace_observed(reference, state.as_ref().clone())
                .await?;
        }
        for event in report.events() {
            self.sink.report(reference, event).await?;
        }

        Ok(report)
    }

    /// Reconcile every filter, at most `max_concurrent_runs` at a time.
    ///
    /// Results come back in input order. A failure of one source never
    /// affects the others.
    pub async fn reconcile_all(
        &self,
        filters: &[SourceFilter],
        shutdown: &CancellationToken,
    ) -> Vec<Result<RunReport>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_runs));
        let mut tasks = JoinSet::new();

        for (index, filter) in filters.iter().cloned().enumerate() {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, this.reconcile(&filter, &shutdown).await)
            });
        }

        let mut slots: Vec<Option<Result<RunReport>>> = filters.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!(error = %e, "reconcile task aborted"),
            }
        }

        let results: Vec<Result<RunReport>> = slots
            .into_iter()
            .zip(filters)
            .map(|(slot, filter)| {
                slot.unwrap_or_else(|| {
                    Err(SiftError::Io(std::io::Error::other(format!(
                        "reconcile task for {} did not complete",
                        filter.source_ref
                    ))))
                })
            })
            .collect();

        let failed = results
            .iter()
            .filter(|r| r.as_ref().map_or(true, RunReport::is_failure))
            .count();
        info!(total = results.len(), failed, "reconciliation finished");

        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_reference_is_serialized() {
        let locks = Arc::new(ReferenceLocks::new());
        let reference = Reference::new("GitRepository", "v1", "app", "default");
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = JoinSet::new();
        for _ in 0..5 {
            let locks = locks.clone();
            let reference = reference.clone();
            let active = active.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                let _guard = locks.acquire(&reference).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_references_do_not_block() {
        let locks = ReferenceLocks::new();
        let a = Reference::new("GitRepository", "v1", "a", "default");
        let b = Reference::new("GitRepository", "v1", "b", "default");

        let _held = locks.acquire(&a).await;
        let acquired =
            tokio::time::timeout(Duration::from_secs(1), locks.acquire(&b)).await;

        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_dropped() {
        let locks = ReferenceLocks::new();
        for i in 0..10 {
            let reference = Reference::new("GitRepository", "v1", format!("app-{i}"), "default");
            drop(locks.acquire(&reference).await);
        }
        assert_eq!(locks.len().await, 1);

        let held = Reference::new("GitRepository", "v1", "held", "default");
        let _guard = locks.acquire(&held).await;
        let other = Reference::new("GitRepository", "v1", "other", "default");
        drop(locks.acquire(&other).await);

        assert_eq!(locks.len().await, 2);
        // Released "other" is pruned, "held" is kept
        let _again = locks.acquire(&Reference::new("GitRepository", "v1", "x", "default")).await;
        assert_eq!(locks.len().await, 2);
    }
}
