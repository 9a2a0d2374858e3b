//! Status reporting
//!
//! A pipeline run never writes status itself. It returns a report whose
//! events a [`StatusSink`] turns into whatever the surrounding system keeps:
//! conditions on a cluster object, a JSON file, or just memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_common::{Fingerprint, ObservedState, Reference, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Something worth telling the outside world about a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StatusEvent {
    /// The referenced source does not exist
    Missing {
        name: String,
        kind: String,
        namespace: String,
    },
    /// The source published an artifact at `url`
    ArtifactResolved { url: String },
    /// The run ended in a failure state
    Failed { message: String },
    /// The filtered content has the given fingerprint
    Ready { fingerprint: Fingerprint },
}

impl StatusEvent {
    pub fn missing(reference: &Reference) -> Self {
        Self::Missing {
            name: reference.name.clone(),
            kind: reference.kind.clone(),
            namespace: reference.namespace.clone(),
        }
    }

    /// Human-readable message for this event
    pub fn message(&self) -> String {
        match self {
            Self::Missing {
                name,
                kind,
                namespace,
            } => format!(
                "resource `{name}` missing. filter is trying to find resource `{name}` of kind `{kind}` in namespace `{namespace}`"
            ),
            Self::ArtifactResolved { url } => format!("resolved artifact from url {url}"),
            Self::Failed { message } => message.clone(),
            Self::Ready { fingerprint } => format!(
                "Repository has been successfully filtered with checksum {fingerprint}"
            ),
        }
    }

    /// The conditions this event sets. A missing source also takes `Ready`
    /// down.
    pub fn conditions(&self) -> Vec<Condition> {
        let message = self.message();
        let condition = |kind, status, reason| Condition {
            kind,
            status,
            reason,
            message: message.clone(),
        };

        match self {
            Self::Missing { .. } => vec![
                condition(
                    ConditionType::SourceMapping,
                    ConditionStatus::False,
                    ConditionReason::NoSuchSource,
                ),
                condition(
                    ConditionType::Ready,
                    ConditionStatus::False,
                    ConditionReason::NoSuchSource,
                ),
            ],
            Self::ArtifactResolved { .. } => vec![condition(
                ConditionType::ArtifactResolved,
                ConditionStatus::True,
                ConditionReason::Resolved,
            )],
            Self::Failed { .. } => vec![condition(
                ConditionType::Ready,
                ConditionStatus::False,
                ConditionReason::Failed,
            )],
            Self::Ready { .. } => vec![condition(
                ConditionType::Ready,
                ConditionStatus::True,
                ConditionReason::Succeeded,
            )],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    SourceMapping,
    ArtifactResolved,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionReason {
    NoSuchSource,
    Resolved,
    Failed,
    Succeeded,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Status condition, one per [`ConditionType`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    pub message: String,
}

/// Receives run events and persists observed state
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Last stored observed state for a reference
    async fn observed(&self, reference: &Reference) -> Result<Option<ObservedState>>;

    async fn report(&self, reference: &Reference, event: StatusEvent) -> Result<()>;

    /// Replace the stored observed state wholesale
    async fn replace_observed(&self, reference: &Reference, state: ObservedState) -> Result<()>;
}

/// Everything a [`MemoryStatusSink`] knows about one reference
#[derive(Debug, Clone, Default)]
pub struct SinkRecord {
    pub observed: Option<ObservedState>,
    pub events: Vec<StatusEvent>,
    pub conditions: BTreeMap<ConditionType, Condition>,
    pub observed_writes: usize,
}

/// In-process status sink
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    records: RwLock<HashMap<String, SinkRecord>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a previously observed state
    pub async fn with_observed(self, reference: &Reference, state: ObservedState) -> Self {
        self.records
            .write()
            .await
            .entry(reference.key())
            .or_default()
            .observed = Some(state);
        self
    }

    pub async fn record(&self, reference: &Reference) -> Option<SinkRecord> {
        self.records.read().await.get(&reference.key()).cloned()
    }
}

#[async_trait]
impl StatusSink for MemoryStatusSink {
    async fn observed(&self, reference: &Reference) -> Result<Option<ObservedState>> {
        Ok(self
            .records
            .read()
            .await
            .get(&reference.key())
            .and_then(|r| r.observed.clone()))
    }

    async fn report(&self, reference: &Reference, event: StatusEvent) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.entry(reference.key()).or_default();
        for condition in event.conditions() {
            record.conditions.insert(condition.kind, condition);
        }
        record.events.push(event);
        Ok(())
    }

    async fn replace_observed(&self, reference: &Reference, state: ObservedState) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.entry(reference.key()).or_default();
        record.observed = Some(state);
        record.observed_writes += 1;
        Ok(())
    }
}
