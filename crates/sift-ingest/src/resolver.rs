//! Source resolution
//!
//! The pipeline only needs one thing from the outside world before it can
//! fetch: an [`ArtifactDescriptor`] for a [`Reference`]. Where that comes
//! from (a cluster API, a registry, a static manifest) is up to the
//! [`SourceResolver`] implementation.

use async_trait::async_trait;
use sift_common::{ArtifactDescriptor, Reference, Result, SiftError};
use std::collections::HashMap;

/// Resolves a reference to the artifact it currently publishes.
///
/// Implementations return [`SiftError::SourceNotFound`] when the referenced
/// object does not exist; any other error is reported as a resolve failure.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, reference: &Reference) -> Result<ArtifactDescriptor>;
}

/// Anything that may expose an artifact descriptor
pub trait HasArtifact {
    fn artifact(&self) -> Option<&ArtifactDescriptor>;
}

impl HasArtifact for ArtifactDescriptor {
    fn artifact(&self) -> Option<&ArtifactDescriptor> {
        Some(self)
    }
}

impl HasArtifact for Option<ArtifactDescriptor> {
    fn artifact(&self) -> Option<&ArtifactDescriptor> {
        self.as_ref()
    }
}

/// Map-backed resolver over catalog entries keyed by [`Reference::key`]
#[derive(Debug, Clone)]
pub struct CatalogResolver<E> {
    entries: HashMap<String, E>,
}

impl<E> Default for CatalogResolver<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E: HasArtifact> CatalogResolver<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the entry for a reference
    pub fn insert(&mut self, reference: &Reference, entry: E) -> Option<E> {
        self.entries.insert(reference.key(), entry)
    }

    pub fn get(&self, reference: &Reference) -> Option<&E> {
        self.entries.get(&reference.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: HasArtifact> FromIterator<(Reference, E)> for CatalogResolver<E> {
    fn from_iter<I: IntoIterator<Item = (Reference, E)>>(iter: I) -> Self {
        let mut resolver = Self::new();
        for (reference, entry) in iter {
            resolver.insert(&reference, entry);
        }
        resolver
    }
}

#[async_trait]
impl<E: HasArtifact + Send + Sync> SourceResolver for CatalogResolver<E> {
    async fn resolve(&self, reference: &Reference) -> Result<ArtifactDescriptor> {
        let entry = self
            .get(reference)
            .ok_or_else(|| SiftError::SourceNotFound(reference.to_string()))?;

        entry
            .artifact()
            .cloned()
            .ok_or_else(|| SiftError::resolve(reference, "artifact not yet available"))
    }
}
