//! Common types used across Sift

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies an upstream content source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub kind: String,
    #[serde(default)]
    pub api_version: String,
    pub name: String,
    pub namespace: String,
}

impl Reference {
    pub fn new(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Stable key used to index locks and stored state.
    ///
    /// The API version is left out on purpose: a source served under a new
    /// version is still the same source.
    pub fn key(&self) -> String {
        format!("{}:{}/{}", self.kind, self.namespace, self.name)
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Descriptor of a retrievable content bundle, as published by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// Path of the artifact relative to the catalog's storage root
    #[serde(default)]
    pub path: String,

    /// Fetch URL of the gzip-compressed tarball
    pub url: String,

    /// Human-readable upstream revision (commit SHA, tag, chart version...)
    #[serde(default)]
    pub revision: String,

    /// Digest in the form `<algorithm>:<checksum>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Legacy SHA-256 of the artifact file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Size of the artifact file in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ArtifactDescriptor {
    /// Descriptor with only a URL set
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            url: url.into(),
            revision: String::new(),
            digest: None,
            checksum: None,
            last_update_time: None,
            size: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Content fingerprint of a filtered file set (`h1:<base64 sha256>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = crate::SiftError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.strip_prefix(crate::fingerprint::FINGERPRINT_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(Self(s.to_string())),
            _ => Err(crate::SiftError::Config(format!(
                "Invalid fingerprint '{}': expected '{}' prefix",
                s,
                crate::fingerprint::FINGERPRINT_PREFIX
            ))),
        }
    }
}

/// A watched source: the upstream reference plus its inclusion patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFilter {
    pub source_ref: Reference,

    /// Gitignore-style inclusion patterns, one per line
    #[serde(default)]
    pub include: String,
}

impl SourceFilter {
    pub fn new(source_ref: Reference, include: impl Into<String>) -> Self {
        Self {
            source_ref,
            include: include.into(),
        }
    }
}

/// Last successfully computed artifact + fingerprint snapshot.
///
/// Always replaced as a whole; fields are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    pub fingerprint: Fingerprint,
    pub artifact: ArtifactDescriptor,
    pub observed_include: String,
    pub observed_file_list: Vec<String>,
    pub url: String,
}
