//! Manifest file handling (sift.yml)
//!
//! The manifest declares the watched sources and a static artifact catalog
//! that stands in for the resolver:
//!
//! ```yaml
//! sources:
//!   - name: app
//!     sourceRef:
//!       kind: GitRepository
//!       name: app
//!       namespace: default
//!     include: |
//!       go.*
//!       internal/**/*.go
//!       !.*
//! catalog:
//!   - reference:
//!       kind: GitRepository
//!       name: app
//!       namespace: default
//!     artifact:
//!       url: http://artifacts.local/app.tar.gz
//!       revision: main@sha1:0123abc
//! ```

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use sift_common::{ArtifactDescriptor, Reference, SourceFilter};
use sift_ingest::{CatalogResolver, HasArtifact};
use std::collections::HashSet;
use std::path::Path;

/// Sift manifest file (sift.yml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,

    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

/// A watched source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    /// Display name; defaults to the referenced object's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub source_ref: Reference,

    /// Inclusion patterns, one per line
    #[serde(default)]
    pub include: String,
}

impl SourceEntry {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.source_ref.name)
    }

    pub fn filter(&self) -> SourceFilter {
        SourceFilter::new(self.source_ref.clone(), self.include.clone())
    }
}

/// An object in the catalog, which may or may not have published an artifact yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub reference: Reference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactDescriptor>,
}

impl HasArtifact for CatalogEntry {
    fn artifact(&self) -> Option<&ArtifactDescriptor> {
        self.artifact.as_ref()
    }
}

impl Manifest {
    /// Load manifest from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_yaml::from_str(&content).map_err(|e| {
            CliError::invalid_manifest(format!("{}: {}", path.display(), e))
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest structure
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut references = HashSet::new();

        for source in &self.sources {
            let reference = &source.source_ref;
            if reference.kind.is_empty() || reference.name.is_empty() {
                return Err(CliError::invalid_manifest(format!(
                    "source '{}' needs a sourceRef with kind and name",
                    source.name()
                )));
            }
            if !names.insert(source.name()) {
                return Err(CliError::invalid_manifest(format!(
                    "duplicate source name '{}'",
                    source.name()
                )));
            }
            if !references.insert(reference.key()) {
                return Err(CliError::invalid_manifest(format!(
                    "source '{}' references {} which is already watched",
                    source.name(),
                    reference
                )));
            }
        }

        let mut catalog = HashSet::new();
        for entry in &self.catalog {
            if !catalog.insert(entry.reference.key()) {
                return Err(CliError::invalid_manifest(format!(
                    "duplicate catalog entry for {}",
                    entry.reference
                )));
            }
        }

        Ok(())
    }

    /// Select sources by name, all of them when `names` is empty
    pub fn select(&self, names: &[String]) -> Result<Vec<&SourceEntry>> {
        if names.is_empty() {
            return Ok(self.sources.iter().collect());
        }

        names
            .iter()
            .map(|name| {
                self.sources
                    .iter()
                    .find(|s| s.name() == name.as_str())
                    .ok_or_else(|| CliError::SourceNotFound(name.clone()))
            })
            .collect()
    }

    /// Resolver backed by the catalog section
    pub fn resolver(&self) -> CatalogResolver<CatalogEntry> {
        self.catalog
            .iter()
            .map(|entry| (entry.reference.clone(), entry.clone()))
            .collect()
    }
}
