//! State file handling (.sift/state.json)
//!
//! Keeps, per watched reference, the last observed state and the latest
//! condition of each type. Every change is written through to disk by
//! writing a temporary file next to the target and renaming it over.

use crate::error::{CliError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_common::{ObservedState, Reference, SiftError};
use sift_ingest::status::{Condition, StatusEvent, StatusSink};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// On-disk state, keyed by [`Reference::key`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceState>,
}

/// Everything recorded for one reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    pub reference: Reference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<ObservedState>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    pub updated_at: DateTime<Utc>,
}

impl SourceState {
    fn new(reference: &Reference) -> Self {
        Self {
            reference: reference.clone(),
            observed: None,
            conditions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Replace the condition of the same type, or add it
    fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }
}

impl StateFile {
    /// Load the state file; a missing file is an empty state
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| CliError::invalid_state(format!("{}: {}", path.display(), e)))
    }

    /// Atomically replace the file at `path` with this state
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic(path.as_ref(), self).map_err(CliError::from)
    }

    pub fn get(&self, reference: &Reference) -> Option<&SourceState> {
        self.sources.get(&reference.key())
    }
}

fn write_atomic(path: &Path, state: &StateFile) -> sift_common::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(&mut tmp, state)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SiftError::Io(e.error))?;
    Ok(())
}

/// [`StatusSink`] backed by a [`StateFile`] on disk
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl StateStore {
    /// Open the store, loading existing state if present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = StateFile::load(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current in-memory state
    pub async fn snapshot(&self) -> StateFile {
        self.state.lock().await.clone()
    }

    async fn update<F>(&self, reference: &Reference, apply: F) -> sift_common::Result<()>
    where
        F: FnOnce(&mut SourceState),
    {
        let mut state = self.state.lock().await;
        let entry = state
            .sources
            .entry(reference.key())
            .or_insert_with(|| SourceState::new(reference));
        apply(entry);
        entry.updated_at = Utc::now();

        // Lock stays held until the file is on disk, so writes land in order
        let snapshot = state.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &snapshot))
            .await
            .map_err(|e| SiftError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl StatusSink for StateStore {
    async fn observed(&self, reference: &Reference) -> sift_common::Result<Option<ObservedState>> {
        Ok(self
            .state
            .lock()
            .await
            .get(reference)
            .and_then(|s| s.observed.clone()))
    }

    async fn report(&self, reference: &Reference, event: StatusEvent) -> sift_common::Result<()> {
        let conditions = event.conditions();
        self.update(reference, |entry| {
            for condition in conditions {
                entry.set_condition(condition);
            }
        })
        .await
    }

    async fn replace_observed(
        &self,
        reference: &Reference,
        observed: ObservedState,
    ) -> sift_common::Result<()> {
        self.update(reference, |entry| entry.observed = Some(observed))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sift_common::ArtifactDescriptor;
    use sift_ingest::status::{ConditionStatus, ConditionType};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reference() -> Reference {
        Reference::new("GitRepository", "v1", "app", "default")
    }

    fn observed() -> ObservedState {
        ObservedState {
            fingerprint: "h1:abc=".parse().unwrap(),
            artifact: ArtifactDescriptor::from_url("http://x/app.tar.gz"),
            observed_include: "*".to_string(),
            observed_file_list: vec!["a.txt".to_string()],
            url: "http://x/app.tar.gz".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(dir.path().join("state.json")).unwrap();
        assert!(state.sources.is_empty());
    }

    #[test]
    fn test_invalid_json_is_invalid_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(StateFile::load(&path), Err(CliError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_store_writes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = StateStore::open(&path).unwrap();

        store.replace_observed(&reference(), observed()).await.unwrap();
        store
            .report(
                &reference(),
                StatusEvent::Failed {
                    message: "first".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .report(
                &reference(),
                StatusEvent::Ready {
                    fingerprint: "h1:abc=".parse().unwrap(),
                },
            )
            .await
            .unwrap();

        let reloaded = StateStore::open(&path).unwrap();
        assert_eq!(
            reloaded.observed(&reference()).await.unwrap(),
            Some(observed())
        );

        let snapshot = reloaded.snapshot().await;
        let source = snapshot.get(&reference()).unwrap();
        assert_eq!(source.conditions.len(), 1);
        assert_eq!(source.conditions[0].kind, ConditionType::Ready);
        assert_eq!(source.conditions[0].status, ConditionStatus::True);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reports_all_reach_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = Arc::new(StateStore::open(&path).unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.spawn(async move {
                let reference = Reference::new("GitRepository", "v1", format!("app-{i}"), "default");
                store
                    .report(
                        &reference,
                        StatusEvent::ArtifactResolved {
                            url: format!("http://x/app-{i}.tar.gz"),
                        },
                    )
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let reloaded = StateFile::load(&path).unwrap();
        assert_eq!(reloaded.sources.len(), 8);
        assert_eq!(reloaded, store.snapshot().await);
    }

    #[tokio::test]
    async fn test_missing_after_ready_clears_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path).unwrap();

        store.replace_observed(&reference(), observed()).await.unwrap();
        store
            .report(
                &reference(),
                StatusEvent::Ready {
                    fingerprint: "h1:abc=".parse().unwrap(),
                },
            )
            .await
            .unwrap();
        store
            .report(&reference(), StatusEvent::missing(&reference()))
            .await
            .unwrap();

        let reloaded = StateFile::load(&path).unwrap();
        let source = reloaded.get(&reference()).unwrap();
        assert_eq!(source.observed, Some(observed()));
        let ready = source
            .conditions
            .iter()
            .find(|c| c.kind == ConditionType::Ready)
            .unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert!(ready.message.starts_with("resource `app` missing."), "{}", ready.message);
    }
}
